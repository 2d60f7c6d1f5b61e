//! Scripted visit capture.
//!
//! A visit script is a JSON file describing what the inspector would enter on
//! each stage, including the pen strokes of both signatures. Running it drives
//! a [`VisitCaptureWorkflow`] through the same operations an interactive shell
//! uses, so every guard applies.
//!
//! ```json
//! {
//!   "school": "S1",
//!   "location": { "latitude": -6.2005, "longitude": 106.8167, "accuracy": 12 },
//!   "category": "IKM",
//!   "notes": "Pembelajaran berdiferensiasi mulai diterapkan",
//!   "empathy": { "schoolClimate": 4, "teacherEngagement": 3, "leadershipVibe": 5 },
//!   "findings": ["Modul ajar belum lengkap"],
//!   "actions": ["Lokakarya modul ajar"],
//!   "photo": "foto-kunjungan.jpg",
//!   "signatures": {
//!     "supervisor": [[[20, 40], [120, 90], [200, 60]]],
//!     "principal": [[[30, 100], [180, 30]]]
//!   }
//! }
//! ```

use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;
use siap_core::location::FixedLocation;
use siap_core::pointer::{MouseAdapter, MouseInput, PointerAdapter};
use siap_core::signature::ClientPoint;
use siap_core::workflow::{EntryList, LocationUpdate, SchoolSelection, SignatureRole};
use siap_core::{
    Coordinate, EmpathyMetric, EmpathyMetrics, ImageArtifact, LocationSource, SchoolDirectory,
    SupervisionType, VisitCaptureWorkflow,
};
use tracing::info;

type Stroke = Vec<[f64; 2]>;

#[derive(Debug, Default, Deserialize)]
pub struct ScriptSignatures {
    #[serde(default)]
    pub supervisor: Vec<Stroke>,
    #[serde(default)]
    pub principal: Vec<Stroke>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitScript {
    /// School id or NPSN.
    pub school: String,
    pub location: Option<Coordinate>,
    pub category: String,
    pub notes: String,
    #[serde(default)]
    pub empathy: Option<EmpathyMetrics>,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    /// Photo file, relative to the script.
    pub photo: Option<String>,
    #[serde(default)]
    pub signatures: ScriptSignatures,
}

/// A parsed script with its photo already loaded.
pub struct LoadedScript {
    pub script: VisitScript,
    pub photo: ImageArtifact,
}

impl LoadedScript {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading visit script {}", path.display()))?;
        let script: VisitScript = serde_json::from_str(&text)
            .with_context(|| format!("parsing visit script {}", path.display()))?;

        let photo = match &script.photo {
            Some(rel) => {
                let photo_path = path.parent().unwrap_or(Path::new(".")).join(rel);
                let bytes = std::fs::read(&photo_path)
                    .with_context(|| format!("reading photo {}", photo_path.display()))?;
                ImageArtifact::from_image_bytes(&bytes)
                    .with_context(|| format!("{} is not a readable image", photo_path.display()))?
            }
            None => ImageArtifact::empty(),
        };
        Ok(Self { script, photo })
    }

    /// Drive `workflow` from stage 1 to the final stage. Submission is left
    /// to the caller. `fallback_location` is used when the script has none.
    pub async fn run(
        self,
        directory: &SchoolDirectory,
        workflow: &mut VisitCaptureWorkflow,
        fallback_location: Option<&dyn LocationSource>,
    ) -> anyhow::Result<()> {
        let Self { script, photo } = self;

        let school = match directory.get(&script.school) {
            Some(s) => s.clone(),
            None => match directory.search(&script.school).as_slice() {
                [only] => (*only).clone(),
                [] => bail!("no school matches {:?}", script.school),
                many => bail!("{:?} matches {} schools; use the school id", script.school, many.len()),
            },
        };

        let fixed = script.location.map(FixedLocation::at);
        let source: &dyn LocationSource = match (&fixed, fallback_location) {
            (Some(fixed), _) => fixed,
            (None, Some(source)) => source,
            (None, None) => bail!("script has no location and no location source is configured"),
        };

        if let SchoolSelection::FetchLocation(ticket) = workflow.select_school(school)? {
            let result =
                siap_core::location::request_with_timeout(source, workflow.config().location)
                    .await;
            match workflow.complete_location(&ticket, result) {
                LocationUpdate::Captured { geofence, .. } => {
                    if let Some(g) = geofence {
                        eprintln!(
                            "  Geofence: {} ({} m)",
                            g.status_label(),
                            g.distance_meter()
                        );
                    }
                }
                LocationUpdate::Failed(failure) => bail!("location unavailable: {failure}"),
                LocationUpdate::Stale => bail!("location result arrived for another draft"),
            }
        }
        workflow.advance()?;

        let category: SupervisionType = script
            .category
            .parse()
            .unwrap_or_else(|never| match never {});
        workflow.select_category(category)?;
        workflow.set_notes(script.notes)?;
        if let Some(e) = script.empathy {
            workflow.set_empathy(EmpathyMetric::SchoolClimate, e.school_climate)?;
            workflow.set_empathy(EmpathyMetric::TeacherEngagement, e.teacher_engagement)?;
            workflow.set_empathy(EmpathyMetric::LeadershipVibe, e.leadership_vibe)?;
        }
        workflow.advance()?;

        for finding in &script.findings {
            workflow.set_entry_input(EntryList::Findings, finding.as_str())?;
            workflow.commit_entry(EntryList::Findings)?;
        }
        for action in &script.actions {
            workflow.set_entry_input(EntryList::Actions, action.as_str())?;
            workflow.commit_entry(EntryList::Actions)?;
        }
        workflow.advance()?;

        if !photo.is_empty() {
            workflow.capture_photo(photo)?;
        }
        draw(workflow, SignatureRole::Supervisor, &script.signatures.supervisor)?;
        draw(workflow, SignatureRole::Principal, &script.signatures.principal)?;

        info!(draft_id = %workflow.draft().id, "scripted capture reached final stage");
        Ok(())
    }
}

/// Replay strokes as mouse input on one signing surface.
fn draw(
    workflow: &mut VisitCaptureWorkflow,
    role: SignatureRole,
    strokes: &[Stroke],
) -> anyhow::Result<()> {
    let mut mouse = MouseAdapter;
    for stroke in strokes {
        let Some(([x, y], rest)) = stroke.split_first().map(|(first, rest)| (*first, rest)) else {
            continue;
        };
        let inputs = std::iter::once(MouseInput::Down(ClientPoint::new(x, y)))
            .chain(rest.iter().map(|[x, y]| MouseInput::Move(ClientPoint::new(*x, *y))))
            .chain(std::iter::once(MouseInput::Up));
        for input in inputs {
            if let Some(event) = mouse.translate(input) {
                workflow.sign(role, event)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use siap_core::{LocationFailure, School, Stage, WorkflowConfig};

    use super::*;

    const SCRIPT: &str = r#"{
        "school": "20100001",
        "location": { "latitude": -6.2018, "longitude": 106.816666 },
        "category": "PBD",
        "notes": "Rapor pendidikan dibahas bersama",
        "empathy": { "schoolClimate": 4, "teacherEngagement": 3, "leadershipVibe": 5 },
        "findings": ["Literasi rendah", "  "],
        "actions": ["Program membaca 15 menit"],
        "signatures": {
            "supervisor": [[[20, 40], [120, 90], [200, 60]]],
            "principal": [[[30, 100], [180, 30]]]
        }
    }"#;

    fn directory() -> SchoolDirectory {
        SchoolDirectory::new(vec![School {
            id: "S1".into(),
            npsn: "20100001".into(),
            name: "SDN 1 Menteng".into(),
            principal: "Ibu Sari".into(),
            inspector_id: "P01".into(),
            latitude: Some(-6.2),
            longitude: Some(106.816666),
        }])
    }

    fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("visit.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn workflow() -> VisitCaptureWorkflow {
        VisitCaptureWorkflow::new("P01", WorkflowConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn script_reaches_final_stage_without_photo() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = LoadedScript::load(&write_script(dir.path(), SCRIPT)).unwrap();
        let mut wf = workflow();
        loaded.run(&directory(), &mut wf, None).await.unwrap();

        assert_eq!(wf.stage(), Stage::PhotoAndSignatures);
        assert_eq!(wf.draft().key_findings, ["Literasi rendah"]);
        assert_eq!(wf.draft().empathy_metrics.leadership_vibe, 5);
        assert!(!wf.draft().signature_supervisor.is_empty());
        assert!(!wf.draft().signature_principal.is_empty());
        // Photo missing: the final guard still blocks submission.
        assert!(wf.submit().is_err());
        assert_eq!(wf.geofence().unwrap().distance_meter(), 200);
    }

    #[tokio::test]
    async fn non_image_photo_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("foto.txt"), b"not an image").unwrap();
        let body = SCRIPT.replacen("\"school\"", "\"photo\": \"foto.txt\", \"school\"", 1);
        assert!(LoadedScript::load(&write_script(dir.path(), &body)).is_err());
    }

    #[tokio::test]
    async fn failed_fallback_location_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let body = SCRIPT.replace(
            r#""location": { "latitude": -6.2018, "longitude": 106.816666 },"#,
            "",
        );
        let loaded = LoadedScript::load(&write_script(dir.path(), &body)).unwrap();
        let denied = FixedLocation::failing(LocationFailure::PermissionDenied);
        let mut wf = workflow();
        let err = loaded
            .run(&directory(), &mut wf, Some(&denied))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(wf.stage(), Stage::LocationAndSchool);
    }

    #[tokio::test]
    async fn unknown_school_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = SCRIPT.replace("20100001", "99999999");
        let loaded = LoadedScript::load(&write_script(dir.path(), &body)).unwrap();
        assert!(loaded.run(&directory(), &mut workflow(), None).await.is_err());
    }
}
