pub mod codec;
pub mod directory;
pub mod error;
pub mod geo;
pub mod geofence;
pub mod location;
pub mod model;
pub mod pointer;
pub mod signature;
pub mod submission;
pub mod workflow;

pub use codec::{CodecError, ImageArtifact};
pub use directory::SchoolDirectory;
pub use error::CoreError;
pub use geofence::{GEOFENCE_RADIUS_METERS, GeofenceResult};
pub use location::{LocationFailure, LocationSource, PositionOptions};
pub use model::{
    Coordinate, EmpathyMetric, EmpathyMetrics, InspectorProfile, School, SchoolVisit,
    SubmissionStatus, SupervisionType,
};
pub use signature::{PointerEvent, SignatureCapture, SignatureOutcome};
pub use submission::{SubmissionAck, SubmissionSink};
pub use workflow::{Stage, VisitCaptureWorkflow, WorkflowConfig, WorkflowError};
