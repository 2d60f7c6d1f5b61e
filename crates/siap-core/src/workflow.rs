//! Four-stage visit capture.
//!
//! A [`VisitCaptureWorkflow`] owns one [`VisitDraft`] and walks it through
//! location/school selection, category and notes, findings and agreed actions,
//! then photo and signatures. Each stage has a completeness guard; forward
//! moves happen one stage at a time and only when the guard holds. Moving back
//! never discards data entered in later stages.
//!
//! Location acquisition is split into [`request_location`] and
//! [`complete_location`] so that the owner can run the request on its event
//! loop. Each request carries a [`LocationTicket`]; a result whose ticket no
//! longer matches the draft (superseded request, draft moved past stage one,
//! finalized draft) is dropped.
//! If the owner cancels the draft while a request is in flight, the ticket
//! simply has nothing left to complete.
//!
//! [`request_location`]: VisitCaptureWorkflow::request_location
//! [`complete_location`]: VisitCaptureWorkflow::complete_location

use std::fmt;

use chrono::{Local, NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{CodecError, ImageArtifact};
use crate::error::CoreError;
use crate::geofence::{self, GEOFENCE_RADIUS_METERS, GeofenceResult};
use crate::location::{self, LocationFailure, LocationSource, PositionOptions};
use crate::model::{
    Coordinate, EmpathyMetric, EmpathyMetrics, School, SchoolVisit, SubmissionStatus,
    SupervisionType,
};
use crate::signature::{
    PointerEvent, SIGNATURE_HEIGHT, SIGNATURE_WIDTH, SignatureCapture, SignatureOutcome, Viewport,
};

/// Tunables for a capture session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowConfig {
    pub geofence_radius_meters: f64,
    pub signature_width: u32,
    pub signature_height: u32,
    pub location: PositionOptions,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            geofence_radius_meters: GEOFENCE_RADIUS_METERS,
            signature_width: SIGNATURE_WIDTH,
            signature_height: SIGNATURE_HEIGHT,
            location: PositionOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    LocationAndSchool,
    CategoryAndNotes,
    FindingsAndActions,
    PhotoAndSignatures,
    Finalized,
}

impl Stage {
    /// 1-based stage number; `Finalized` is 5.
    pub fn number(self) -> u8 {
        match self {
            Self::LocationAndSchool => 1,
            Self::CategoryAndNotes => 2,
            Self::FindingsAndActions => 3,
            Self::PhotoAndSignatures => 4,
            Self::Finalized => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::LocationAndSchool => "Validasi Lokasi",
            Self::CategoryAndNotes => "Instrumen Kunjungan",
            Self::FindingsAndActions => "Temuan dan Tindak Lanjut",
            Self::PhotoAndSignatures => "Pengesahan Digital",
            Self::Finalized => "Selesai",
        }
    }

    fn next(self) -> Option<Stage> {
        match self {
            Self::LocationAndSchool => Some(Self::CategoryAndNotes),
            Self::CategoryAndNotes => Some(Self::FindingsAndActions),
            Self::FindingsAndActions => Some(Self::PhotoAndSignatures),
            Self::PhotoAndSignatures | Self::Finalized => None,
        }
    }

    fn previous(self) -> Option<Stage> {
        match self {
            Self::LocationAndSchool | Self::Finalized => None,
            Self::CategoryAndNotes => Some(Self::LocationAndSchool),
            Self::FindingsAndActions => Some(Self::CategoryAndNotes),
            Self::PhotoAndSignatures => Some(Self::FindingsAndActions),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.title())
    }
}

/// A field that must be filled before the current stage can be left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    Location,
    School,
    Category,
    Notes,
    AgreedAction,
    Photo,
    SupervisorSignature,
    PrincipalSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureRole {
    Supervisor,
    Principal,
}

/// The two ordered lists collected at stage 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryList {
    Findings,
    Actions,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("action belongs to stage {expected}, workflow is at stage {actual}")]
    WrongStage { expected: Stage, actual: Stage },

    #[error("stage {stage} is incomplete: missing {missing:?}")]
    Incomplete {
        stage: Stage,
        missing: Vec<Requirement>,
    },

    #[error("cannot jump forward to stage {0}")]
    ForwardJump(Stage),

    #[error("the final stage is left by submitting, not advancing")]
    SubmitRequired,

    #[error("a location request is already in flight")]
    LocationPending,

    #[error("{list:?} has no entry at index {index}")]
    NoSuchEntry { list: EntryList, index: usize },

    #[error("empathy score {0} is outside 1..=5")]
    ScoreOutOfRange(u8),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// The mutable record accumulated across stages.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitDraft {
    pub id: String,
    pub date: NaiveDate,
    pub school: Option<School>,
    pub category: Option<SupervisionType>,
    pub notes: String,
    pub key_findings: Vec<String>,
    pub agreed_actions: Vec<String>,
    pub signature_supervisor: ImageArtifact,
    pub signature_principal: ImageArtifact,
    pub photo: ImageArtifact,
    pub empathy_metrics: EmpathyMetrics,
}

impl VisitDraft {
    pub fn new(id: String, date: NaiveDate) -> Self {
        Self {
            id,
            date,
            school: None,
            category: None,
            notes: String::new(),
            key_findings: Vec::new(),
            agreed_actions: Vec::new(),
            signature_supervisor: ImageArtifact::empty(),
            signature_principal: ImageArtifact::empty(),
            photo: ImageArtifact::empty(),
            empathy_metrics: EmpathyMetrics::default(),
        }
    }

    fn list(&self, list: EntryList) -> &Vec<String> {
        match list {
            EntryList::Findings => &self.key_findings,
            EntryList::Actions => &self.agreed_actions,
        }
    }

    fn list_mut(&mut self, list: EntryList) -> &mut Vec<String> {
        match list {
            EntryList::Findings => &mut self.key_findings,
            EntryList::Actions => &mut self.agreed_actions,
        }
    }
}

/// `VK-` followed by six upper-case alphanumerics.
pub fn generate_visit_id() -> String {
    const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut bits = uuid::Uuid::new_v4().as_u128();
    let suffix: String = (0..6)
        .map(|_| {
            let digit = (bits % 36) as usize;
            bits /= 36;
            char::from(ALPHABET[digit])
        })
        .collect();
    format!("VK-{suffix}")
}

/// Identifies one location request for one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTicket {
    draft_id: String,
    generation: u64,
}

impl LocationTicket {
    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }
}

/// What happened when a location result was delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationUpdate {
    /// Coordinate stored; geofence re-evaluated if a school is selected.
    Captured {
        coordinate: Coordinate,
        geofence: Option<GeofenceResult>,
    },
    /// The request failed; the coordinate is unchanged and retry is possible.
    Failed(LocationFailure),
    /// The ticket no longer belongs to an active request; result discarded.
    Stale,
}

/// What selecting a school triggered.
#[derive(Debug, Clone, PartialEq)]
pub enum SchoolSelection {
    /// A coordinate was already captured; the geofence was evaluated.
    Evaluated(GeofenceResult),
    /// No coordinate yet: the caller must run this location request.
    FetchLocation(LocationTicket),
    /// A request is already in flight; evaluation runs when it completes.
    AwaitingLocation,
}

pub struct VisitCaptureWorkflow {
    inspector_id: String,
    config: WorkflowConfig,
    stage: Stage,
    draft: VisitDraft,
    location: Option<Coordinate>,
    location_failure: Option<LocationFailure>,
    pending_fetch: Option<u64>,
    fetch_generation: u64,
    geofence: Option<GeofenceResult>,
    finding_input: String,
    action_input: String,
    supervisor_pad: SignatureCapture,
    principal_pad: SignatureCapture,
}

impl VisitCaptureWorkflow {
    /// Start a new draft with a fresh id and today's local date.
    pub fn new(inspector_id: impl Into<String>, config: WorkflowConfig) -> Result<Self, WorkflowError> {
        let draft = VisitDraft::new(generate_visit_id(), Local::now().date_naive());
        Self::with_draft(inspector_id, draft, config)
    }

    /// Start from a prepared empty draft (fixed id and date).
    pub fn with_draft(
        inspector_id: impl Into<String>,
        draft: VisitDraft,
        config: WorkflowConfig,
    ) -> Result<Self, WorkflowError> {
        let (w, h) = (config.signature_width, config.signature_height);
        let pad = SignatureCapture::new(w, h, Viewport::identity(w, h))?;
        info!(draft_id = %draft.id, "visit draft started");
        Ok(Self {
            inspector_id: inspector_id.into(),
            config,
            stage: Stage::LocationAndSchool,
            draft,
            location: None,
            location_failure: None,
            pending_fetch: None,
            fetch_generation: 0,
            geofence: None,
            finding_input: String::new(),
            action_input: String::new(),
            supervisor_pad: pad.clone(),
            principal_pad: pad,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn draft(&self) -> &VisitDraft {
        &self.draft
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn inspector_id(&self) -> &str {
        &self.inspector_id
    }

    pub fn location(&self) -> Option<Coordinate> {
        self.location
    }

    /// The most recent location failure, cleared by the next request.
    pub fn location_failure(&self) -> Option<&LocationFailure> {
        self.location_failure.as_ref()
    }

    /// Whether a location request is in flight (capture control busy).
    pub fn is_locating(&self) -> bool {
        self.pending_fetch.is_some()
    }

    /// Geofence outcome for the current school and coordinate, once both exist.
    pub fn geofence(&self) -> Option<GeofenceResult> {
        self.geofence
    }

    fn expect_stage(&self, expected: Stage) -> Result<(), WorkflowError> {
        if self.stage != expected {
            return Err(WorkflowError::WrongStage {
                expected,
                actual: self.stage,
            });
        }
        Ok(())
    }

    // ── Stage 1: location and school ──

    /// Start a location request. Fails while another request is in flight.
    pub fn request_location(&mut self) -> Result<LocationTicket, WorkflowError> {
        self.expect_stage(Stage::LocationAndSchool)?;
        if self.pending_fetch.is_some() {
            return Err(WorkflowError::LocationPending);
        }
        self.fetch_generation += 1;
        self.pending_fetch = Some(self.fetch_generation);
        self.location_failure = None;
        debug!(draft_id = %self.draft.id, generation = self.fetch_generation, "location requested");
        Ok(LocationTicket {
            draft_id: self.draft.id.clone(),
            generation: self.fetch_generation,
        })
    }

    /// Deliver the result of a location request.
    pub fn complete_location(
        &mut self,
        ticket: &LocationTicket,
        result: Result<Coordinate, LocationFailure>,
    ) -> LocationUpdate {
        let current = ticket.draft_id == self.draft.id
            && self.pending_fetch == Some(ticket.generation)
            && self.stage == Stage::LocationAndSchool;
        if !current {
            debug!(draft_id = %ticket.draft_id, "discarding stale location result");
            return LocationUpdate::Stale;
        }
        self.pending_fetch = None;

        match result {
            Ok(coordinate) => {
                self.location = Some(coordinate);
                self.reevaluate();
                info!(
                    draft_id = %self.draft.id,
                    lat = coordinate.latitude(),
                    lon = coordinate.longitude(),
                    accuracy = ?coordinate.accuracy(),
                    "location captured"
                );
                LocationUpdate::Captured {
                    coordinate,
                    geofence: self.geofence,
                }
            }
            Err(failure) => {
                warn!(draft_id = %self.draft.id, %failure, "location request failed");
                self.location_failure = Some(failure.clone());
                LocationUpdate::Failed(failure)
            }
        }
    }

    /// Run a location request to completion against `source`.
    pub async fn fetch_location<S>(&mut self, source: &S) -> Result<LocationUpdate, WorkflowError>
    where
        S: LocationSource + ?Sized,
    {
        let ticket = self.request_location()?;
        let result = location::request_with_timeout(source, self.config.location).await;
        Ok(self.complete_location(&ticket, result))
    }

    /// Select the school being visited.
    pub fn select_school(&mut self, school: School) -> Result<SchoolSelection, WorkflowError> {
        self.expect_stage(Stage::LocationAndSchool)?;
        info!(draft_id = %self.draft.id, school_id = %school.id, school = %school.name, "school selected");
        self.draft.school = Some(school);
        self.geofence = None;

        if self.location.is_some() {
            self.reevaluate();
            return Ok(SchoolSelection::Evaluated(
                self.geofence.unwrap_or(GeofenceResult::INDETERMINATE),
            ));
        }
        if self.pending_fetch.is_some() {
            return Ok(SchoolSelection::AwaitingLocation);
        }
        Ok(SchoolSelection::FetchLocation(self.request_location()?))
    }

    /// Drop the current school selection, e.g. when the search field is reopened.
    pub fn clear_school(&mut self) -> Result<(), WorkflowError> {
        self.expect_stage(Stage::LocationAndSchool)?;
        self.draft.school = None;
        self.geofence = None;
        Ok(())
    }

    fn reevaluate(&mut self) {
        self.geofence = match (&self.location, &self.draft.school) {
            (Some(coord), Some(school)) => {
                let result = geofence::evaluate(coord, school, self.config.geofence_radius_meters);
                info!(
                    draft_id = %self.draft.id,
                    distance_m = ?result.distance_meters,
                    verified = ?result.verified,
                    "geofence evaluated"
                );
                Some(result)
            }
            _ => None,
        };
    }

    // ── Stage 2: category and notes ──

    pub fn select_category(&mut self, category: SupervisionType) -> Result<(), WorkflowError> {
        self.expect_stage(Stage::CategoryAndNotes)?;
        self.draft.category = Some(category);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_stage(Stage::CategoryAndNotes)?;
        self.draft.notes = notes.into();
        Ok(())
    }

    pub fn set_empathy(&mut self, metric: EmpathyMetric, score: u8) -> Result<(), WorkflowError> {
        self.expect_stage(Stage::CategoryAndNotes)?;
        if !(EmpathyMetrics::MIN_SCORE..=EmpathyMetrics::MAX_SCORE).contains(&score) {
            return Err(WorkflowError::ScoreOutOfRange(score));
        }
        let m = &mut self.draft.empathy_metrics;
        match metric {
            EmpathyMetric::SchoolClimate => m.school_climate = score,
            EmpathyMetric::TeacherEngagement => m.teacher_engagement = score,
            EmpathyMetric::LeadershipVibe => m.leadership_vibe = score,
        }
        Ok(())
    }

    // ── Stage 3: findings and actions ──

    pub fn entries(&self, list: EntryList) -> &[String] {
        self.draft.list(list)
    }

    pub fn entry_input(&self, list: EntryList) -> &str {
        match list {
            EntryList::Findings => &self.finding_input,
            EntryList::Actions => &self.action_input,
        }
    }

    /// Replace the text of the entry input buffer.
    pub fn set_entry_input(&mut self, list: EntryList, text: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_stage(Stage::FindingsAndActions)?;
        let buffer = match list {
            EntryList::Findings => &mut self.finding_input,
            EntryList::Actions => &mut self.action_input,
        };
        *buffer = text.into();
        Ok(())
    }

    /// Append the input buffer to its list and clear the buffer.
    ///
    /// Bound to both the enter key and the add button. Returns `false` and
    /// leaves everything untouched when the buffer is blank.
    pub fn commit_entry(&mut self, list: EntryList) -> Result<bool, WorkflowError> {
        self.expect_stage(Stage::FindingsAndActions)?;
        let buffer = match list {
            EntryList::Findings => std::mem::take(&mut self.finding_input),
            EntryList::Actions => std::mem::take(&mut self.action_input),
        };
        let appended = self.append(list, &buffer);
        if !appended {
            self.set_entry_input(list, buffer)?;
        }
        Ok(appended)
    }

    /// Append `text` directly, bypassing the input buffer.
    pub fn add_entry(&mut self, list: EntryList, text: &str) -> Result<bool, WorkflowError> {
        self.expect_stage(Stage::FindingsAndActions)?;
        Ok(self.append(list, text))
    }

    fn append(&mut self, list: EntryList, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let entries = self.draft.list_mut(list);
        entries.push(text.to_string());
        debug!(?list, count = entries.len(), "entry added");
        true
    }

    /// Remove the entry at `index`, preserving the order of the rest.
    pub fn remove_entry(&mut self, list: EntryList, index: usize) -> Result<String, WorkflowError> {
        self.expect_stage(Stage::FindingsAndActions)?;
        let entries = self.draft.list_mut(list);
        if index >= entries.len() {
            return Err(WorkflowError::NoSuchEntry { list, index });
        }
        Ok(entries.remove(index))
    }

    // ── Stage 4: photo and signatures ──

    /// Store the visit photo, replacing any earlier one.
    pub fn capture_photo(&mut self, photo: ImageArtifact) -> Result<(), WorkflowError> {
        self.expect_stage(Stage::PhotoAndSignatures)?;
        self.draft.photo = photo;
        Ok(())
    }

    pub fn signature_pad(&self, role: SignatureRole) -> &SignatureCapture {
        match role {
            SignatureRole::Supervisor => &self.supervisor_pad,
            SignatureRole::Principal => &self.principal_pad,
        }
    }

    fn pad_and_slot(&mut self, role: SignatureRole) -> (&mut SignatureCapture, &mut ImageArtifact) {
        match role {
            SignatureRole::Supervisor => (&mut self.supervisor_pad, &mut self.draft.signature_supervisor),
            SignatureRole::Principal => (&mut self.principal_pad, &mut self.draft.signature_principal),
        }
    }

    pub fn set_signature_viewport(&mut self, role: SignatureRole, viewport: Viewport) {
        self.pad_and_slot(role).0.set_viewport(viewport);
    }

    /// Feed a pointer event to a signing surface; a saved signature is stored.
    pub fn sign(
        &mut self,
        role: SignatureRole,
        event: PointerEvent,
    ) -> Result<Option<SignatureOutcome>, WorkflowError> {
        self.expect_stage(Stage::PhotoAndSignatures)?;
        let (pad, slot) = self.pad_and_slot(role);
        let outcome = pad.handle(event)?;
        if let Some(SignatureOutcome::Saved(artifact)) = &outcome {
            *slot = artifact.clone();
            debug!(?role, "signature stored");
        }
        Ok(outcome)
    }

    /// Wipe a signing surface and empty its stored signature.
    pub fn clear_signature(&mut self, role: SignatureRole) -> Result<SignatureOutcome, WorkflowError> {
        self.expect_stage(Stage::PhotoAndSignatures)?;
        let (pad, slot) = self.pad_and_slot(role);
        *slot = pad.clear();
        Ok(SignatureOutcome::Cleared)
    }

    // ── Navigation ──

    /// Fields still missing for the current stage's guard.
    pub fn missing_requirements(&self) -> Vec<Requirement> {
        let d = &self.draft;
        let mut missing = Vec::new();
        match self.stage {
            Stage::LocationAndSchool => {
                if self.location.is_none() {
                    missing.push(Requirement::Location);
                }
                if d.school.is_none() {
                    missing.push(Requirement::School);
                }
            }
            Stage::CategoryAndNotes => {
                if d.category.as_ref().is_none_or(SupervisionType::is_empty) {
                    missing.push(Requirement::Category);
                }
                if d.notes.trim().is_empty() {
                    missing.push(Requirement::Notes);
                }
            }
            Stage::FindingsAndActions => {
                if d.agreed_actions.is_empty() {
                    missing.push(Requirement::AgreedAction);
                }
            }
            Stage::PhotoAndSignatures => {
                if d.photo.is_empty() {
                    missing.push(Requirement::Photo);
                }
                if d.signature_supervisor.is_empty() {
                    missing.push(Requirement::SupervisorSignature);
                }
                if d.signature_principal.is_empty() {
                    missing.push(Requirement::PrincipalSignature);
                }
            }
            Stage::Finalized => {}
        }
        missing
    }

    /// Whether the advance (or, at stage 4, submit) control is enabled.
    pub fn can_advance(&self) -> bool {
        self.stage != Stage::Finalized && self.missing_requirements().is_empty()
    }

    fn check_guard(&self) -> Result<(), WorkflowError> {
        let missing = self.missing_requirements();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Incomplete {
                stage: self.stage,
                missing,
            })
        }
    }

    /// Move to the next stage if the current guard holds.
    pub fn advance(&mut self) -> Result<Stage, WorkflowError> {
        let next = match self.stage {
            Stage::PhotoAndSignatures => return Err(WorkflowError::SubmitRequired),
            stage => stage.next().ok_or(WorkflowError::WrongStage {
                expected: Stage::PhotoAndSignatures,
                actual: stage,
            })?,
        };
        self.check_guard()?;
        if self.stage == Stage::LocationAndSchool && self.pending_fetch.take().is_some() {
            debug!(draft_id = %self.draft.id, "abandoning in-flight location request");
        }
        info!(draft_id = %self.draft.id, from = self.stage.number(), to = next.number(), "stage advanced");
        self.stage = next;
        Ok(next)
    }

    /// Step back one stage.
    pub fn back(&mut self) -> Result<Stage, WorkflowError> {
        let previous = self.stage.previous().ok_or(WorkflowError::WrongStage {
            expected: Stage::CategoryAndNotes,
            actual: self.stage,
        })?;
        self.stage = previous;
        Ok(previous)
    }

    /// Return to `stage`, which must not be ahead of the current one.
    pub fn return_to(&mut self, stage: Stage) -> Result<Stage, WorkflowError> {
        if self.stage == Stage::Finalized {
            return Err(WorkflowError::WrongStage {
                expected: Stage::PhotoAndSignatures,
                actual: Stage::Finalized,
            });
        }
        if stage > self.stage {
            return Err(WorkflowError::ForwardJump(stage));
        }
        self.stage = stage;
        Ok(stage)
    }

    // ── Terminal transitions ──

    /// Finalize the draft, stamping the current local time.
    pub fn submit(&mut self) -> Result<SchoolVisit, WorkflowError> {
        self.submit_at(Local::now().time())
    }

    /// Finalize the draft with an explicit time of day.
    ///
    /// Rejected without side effects unless the stage-4 guard holds. On
    /// success the workflow is `Finalized` and accepts no further edits.
    pub fn submit_at(&mut self, time: NaiveTime) -> Result<SchoolVisit, WorkflowError> {
        self.expect_stage(Stage::PhotoAndSignatures)?;
        self.check_guard()?;

        let d = &self.draft;
        let incomplete = |missing: Requirement| WorkflowError::Incomplete {
            stage: Stage::PhotoAndSignatures,
            missing: vec![missing],
        };
        let school = d.school.as_ref().ok_or_else(|| incomplete(Requirement::School))?;
        let location = self.location.ok_or_else(|| incomplete(Requirement::Location))?;
        let category = d.category.clone().ok_or_else(|| incomplete(Requirement::Category))?;
        let geofence = self.geofence.unwrap_or(GeofenceResult::INDETERMINATE);

        let visit = SchoolVisit {
            id: d.id.clone(),
            inspector_id: self.inspector_id.clone(),
            school_id: Some(school.id.clone()),
            school_name: school.name.clone(),
            principal_name: school.principal.clone(),
            date: d.date.format("%Y-%m-%d").to_string(),
            jam: time.format("%H:%M").to_string(),
            supervision_type: category,
            location: Some(location),
            location_verified: geofence.location_verified(),
            distance_meter: geofence.distance_meter(),
            location_status: geofence.status_label().to_string(),
            photo: d.photo.clone(),
            notes: d.notes.clone(),
            empathy_metrics: d.empathy_metrics,
            key_findings: d.key_findings.clone(),
            agreed_actions: d.agreed_actions.clone(),
            signature_supervisor: d.signature_supervisor.clone(),
            signature_principal: d.signature_principal.clone(),
            status: SubmissionStatus::Submitted,
            link_pdf: None,
        };

        self.stage = Stage::Finalized;
        info!(
            draft_id = %visit.id,
            school = %visit.school_name,
            status = %visit.location_status,
            distance_m = visit.distance_meter,
            "visit finalized"
        );
        Ok(visit)
    }

    /// Discard the draft. Any in-flight location ticket becomes unusable.
    pub fn cancel(self) {
        info!(draft_id = %self.draft.id, stage = self.stage.number(), "visit draft discarded");
    }
}

/// Deliver a location result to whichever draft the owner currently holds.
///
/// Results for a draft that was cancelled or replaced are discarded.
pub fn deliver_location(
    active: Option<&mut VisitCaptureWorkflow>,
    ticket: &LocationTicket,
    result: Result<Coordinate, LocationFailure>,
) -> LocationUpdate {
    match active {
        Some(workflow) => workflow.complete_location(ticket, result),
        None => {
            debug!(draft_id = %ticket.draft_id, "no active draft; location result dropped");
            LocationUpdate::Stale
        }
    }
}
