//! Submission collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::SchoolVisit;

/// Acknowledgement returned by a sink that accepted a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub visit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Destination for finalized visits, e.g. the remote data service.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn submit(&self, visit: &SchoolVisit) -> Result<SubmissionAck, Self::Error>;
}
