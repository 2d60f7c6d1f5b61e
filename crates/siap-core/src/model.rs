//! Visit, school and inspector records shared with the remote data service.
//!
//! Field names serialize in camelCase to match the spreadsheet-backed store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::ImageArtifact;
use crate::error::CoreError;

/// A captured or registered position in WGS84 degrees.
///
/// Construction rejects NaN and infinite components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy: Option<f64>,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoreError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        let coord = Coordinate::new(raw.latitude, raw.longitude)?;
        match raw.accuracy {
            Some(acc) => coord.with_accuracy(acc),
            None => Ok(coord),
        }
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoreError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy: None,
        })
    }

    /// Attach the reported accuracy radius in meters.
    pub fn with_accuracy(mut self, accuracy: f64) -> Result<Self, CoreError> {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(CoreError::InvalidAccuracy(accuracy));
        }
        self.accuracy = Some(accuracy);
        Ok(self)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    /// Haversine distance to another coordinate in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        crate::geo::distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat: {:.6}, Lon: {:.6}", self.latitude, self.longitude)
    }
}

/// A school assigned to an inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub npsn: String,
    pub name: String,
    pub principal: String,
    pub inspector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl School {
    /// The registered coordinate, if both components are present and finite.
    pub fn registered_coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        }
    }
}

/// Focus area of a supervision visit.
///
/// Serialized as the display value. Values outside the known set are kept
/// verbatim in [`SupervisionType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SupervisionType {
    Ikm,
    Pbd,
    Kombel,
    Pmm,
    Digital,
    Manajerial,
    Academic,
    Coaching,
    Other(String),
}

impl SupervisionType {
    /// Categories offered by the capture form, in menu order.
    pub const SELECTABLE: [SupervisionType; 6] = [
        SupervisionType::Ikm,
        SupervisionType::Pbd,
        SupervisionType::Kombel,
        SupervisionType::Pmm,
        SupervisionType::Digital,
        SupervisionType::Manajerial,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ikm => "Kurikulum Merdeka",
            Self::Pbd => "Rapor Pendidikan",
            Self::Kombel => "Komunitas Belajar",
            Self::Pmm => "Kinerja PMM",
            Self::Digital => "Digitalisasi",
            Self::Manajerial => "Tata Kelola",
            Self::Academic => "Akademik",
            Self::Coaching => "Pendampingan",
            Self::Other(s) => s,
        }
    }

    /// Short menu label.
    pub fn menu_label(&self) -> &str {
        match self {
            Self::Ikm => "IKM",
            Self::Pbd => "PBD",
            Self::Kombel => "Kombel",
            Self::Pmm => "PMM",
            Self::Digital => "Digital",
            Self::Manajerial => "Manajerial",
            Self::Academic => "Akademik",
            Self::Coaching => "Pendampingan",
            Self::Other(s) => s,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<String> for SupervisionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Kurikulum Merdeka" => Self::Ikm,
            "Rapor Pendidikan" => Self::Pbd,
            "Komunitas Belajar" => Self::Kombel,
            "Kinerja PMM" => Self::Pmm,
            "Digitalisasi" => Self::Digital,
            "Tata Kelola" => Self::Manajerial,
            "Akademik" => Self::Academic,
            "Pendampingan" => Self::Coaching,
            _ => Self::Other(value),
        }
    }
}

impl From<SupervisionType> for String {
    fn from(value: SupervisionType) -> Self {
        match value {
            SupervisionType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for SupervisionType {
    type Err = std::convert::Infallible;

    /// Accepts either the display value or the short menu label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let by_label = Self::SELECTABLE
            .iter()
            .chain([Self::Academic, Self::Coaching].iter())
            .find(|t| t.menu_label().eq_ignore_ascii_case(s))
            .cloned();
        Ok(by_label.unwrap_or_else(|| Self::from(s.to_string())))
    }
}

impl fmt::Display for SupervisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative scores recorded alongside a visit, each 1–5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmpathyMetrics {
    pub school_climate: u8,
    pub teacher_engagement: u8,
    pub leadership_vibe: u8,
}

impl EmpathyMetrics {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 5;
    pub const DEFAULT_SCORE: u8 = 3;
}

impl Default for EmpathyMetrics {
    fn default() -> Self {
        Self {
            school_climate: Self::DEFAULT_SCORE,
            teacher_engagement: Self::DEFAULT_SCORE,
            leadership_vibe: Self::DEFAULT_SCORE,
        }
    }
}

/// Selects one of the three [`EmpathyMetrics`] scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmpathyMetric {
    SchoolClimate,
    TeacherEngagement,
    LeadershipVibe,
}

/// Lifecycle tag of a visit record on the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Draft,
    #[default]
    Submitted,
    Archived,
}

/// Human-readable location label for a verified visit.
pub const STATUS_ON_SITE: &str = "DI LOKASI";
/// Human-readable location label for an unverified or indeterminate visit.
pub const STATUS_TOO_FAR: &str = "JARAK JAUH";

/// A finalized, immutable visit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolVisit {
    pub id: String,
    pub inspector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    pub school_name: String,
    pub principal_name: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    /// Local time of day, `HH:MM`. Empty on records that never carried one.
    #[serde(default)]
    pub jam: String,
    #[serde(rename = "type")]
    pub supervision_type: SupervisionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    pub location_verified: bool,
    pub distance_meter: i64,
    pub location_status: String,
    #[serde(default, rename = "photoUrl")]
    pub photo: ImageArtifact,
    pub notes: String,
    pub empathy_metrics: EmpathyMetrics,
    pub key_findings: Vec<String>,
    pub agreed_actions: Vec<String>,
    #[serde(default)]
    pub signature_supervisor: ImageArtifact,
    #[serde(default)]
    pub signature_principal: ImageArtifact,
    pub status: SubmissionStatus,
    #[serde(default, rename = "link_pdf", skip_serializing_if = "Option::is_none")]
    pub link_pdf: Option<String>,
}

/// Inspector profile as served by the remote data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectorProfile {
    pub id_pengawas: String,
    pub nama_pengawas: String,
    #[serde(default)]
    pub nip: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub wilayah: String,
    #[serde(default)]
    pub jabatan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_non_finite() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinate::new(-6.2, 106.8).is_ok());
    }

    #[test]
    fn coordinate_rejects_negative_accuracy() {
        let c = Coordinate::new(-6.2, 106.8).unwrap();
        assert!(c.with_accuracy(-1.0).is_err());
        assert_eq!(c.with_accuracy(12.5).unwrap().accuracy(), Some(12.5));
    }

    #[test]
    fn coordinate_deserialize_validates() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude": -6.2, "longitude": 106.8, "accuracy": 5}"#)
                .unwrap();
        assert_eq!(ok.accuracy(), Some(5.0));
        let bad = serde_json::from_str::<Coordinate>(
            r#"{"latitude": -6.2, "longitude": 106.8, "accuracy": -3}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn school_without_coordinate() {
        let school = School {
            id: "S1".into(),
            npsn: "20100001".into(),
            name: "SDN 1 Menteng".into(),
            principal: "Ibu Sari".into(),
            inspector_id: "P01".into(),
            latitude: Some(-6.2),
            longitude: None,
        };
        assert!(school.registered_coordinate().is_none());
    }

    #[test]
    fn supervision_type_round_trips_display_value() {
        let json = serde_json::to_string(&SupervisionType::Kombel).unwrap();
        assert_eq!(json, r#""Komunitas Belajar""#);
        let parsed: SupervisionType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SupervisionType::Kombel);
    }

    #[test]
    fn supervision_type_keeps_unknown_values() {
        let parsed: SupervisionType = serde_json::from_str(r#""Supervisi Klinis""#).unwrap();
        assert_eq!(parsed, SupervisionType::Other("Supervisi Klinis".into()));
        assert_eq!(String::from(parsed), "Supervisi Klinis");
    }

    #[test]
    fn supervision_type_parses_menu_labels() {
        assert_eq!("pmm".parse::<SupervisionType>().unwrap(), SupervisionType::Pmm);
        assert_eq!(
            "Tata Kelola".parse::<SupervisionType>().unwrap(),
            SupervisionType::Manajerial
        );
    }

    #[test]
    fn empathy_defaults_to_three() {
        let m = EmpathyMetrics::default();
        assert_eq!(
            (m.school_climate, m.teacher_engagement, m.leadership_vibe),
            (3, 3, 3)
        );
    }
}
