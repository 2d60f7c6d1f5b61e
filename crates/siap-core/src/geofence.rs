//! Presence verification against a school's registered coordinate.

use serde::{Deserialize, Serialize};

use crate::model::{Coordinate, STATUS_ON_SITE, STATUS_TOO_FAR, School};

/// Default radius within which a captured location counts as on site.
pub const GEOFENCE_RADIUS_METERS: f64 = 250.0;

/// Slack absorbed at the boundary so a point placed exactly on the radius
/// is not rejected by floating-point noise in the haversine.
const BOUNDARY_EPSILON_METERS: f64 = 1e-6;

/// Outcome of comparing a captured location with a school coordinate.
///
/// Both fields are `None` exactly when the school has no registered
/// coordinate. That state means "cannot verify" and is distinct from
/// `verified == Some(false)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceResult {
    pub distance_meters: Option<f64>,
    pub verified: Option<bool>,
}

impl GeofenceResult {
    pub const INDETERMINATE: GeofenceResult = GeofenceResult {
        distance_meters: None,
        verified: None,
    };

    pub fn is_indeterminate(&self) -> bool {
        self.verified.is_none()
    }

    /// Tri-state collapsed for the finalized record: indeterminate is `false`.
    pub fn location_verified(&self) -> bool {
        self.verified == Some(true)
    }

    /// Rounded distance for the finalized record, `0` when indeterminate.
    pub fn distance_meter(&self) -> i64 {
        self.distance_meters.map(|d| d.round() as i64).unwrap_or(0)
    }

    pub fn status_label(&self) -> &'static str {
        if self.location_verified() {
            STATUS_ON_SITE
        } else {
            STATUS_TOO_FAR
        }
    }
}

/// Evaluate `captured` against the school's coordinate with an inclusive radius.
pub fn evaluate(captured: &Coordinate, school: &School, radius_meters: f64) -> GeofenceResult {
    let Some(registered) = school.registered_coordinate() else {
        return GeofenceResult::INDETERMINATE;
    };
    let distance = captured.distance_to(&registered);
    GeofenceResult {
        distance_meters: Some(distance),
        verified: Some(distance <= radius_meters + BOUNDARY_EPSILON_METERS),
    }
}
