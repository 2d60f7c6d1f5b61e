//! HTTP client for the spreadsheet-backed SIAP data service.
//!
//! Every call goes to a single endpoint; the operation is selected with an
//! `action` parameter (query string for reads, JSON body for writes). Replies
//! use the envelope `{ "status": "success" | "error", "data"?, "message"? }`.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use siap_core::{InspectorProfile, School, SchoolVisit, SubmissionAck, SubmissionSink};
use thiserror::Error;
use tracing::{debug, info};

use crate::wire;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("data service reported an error: {0}")]
    Service(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Unwrap a reply envelope, turning an `error` status into [`SyncError::Service`].
fn open_envelope(body: &str) -> Result<Option<Value>, SyncError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if !envelope.is_success() {
        let message = envelope
            .message
            .unwrap_or_else(|| format!("status {}", envelope.status));
        return Err(SyncError::Service(message));
    }
    Ok(envelope.data)
}

fn data_as<T: DeserializeOwned + Default>(data: Option<Value>) -> Result<T, SyncError> {
    match data {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => Ok(serde_json::from_value(v)?),
    }
}

/// Client for the data service's read and write actions.
#[derive(Debug, Clone)]
pub struct DataServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl DataServiceClient {
    /// Create a client for the given endpoint URL (trailing slash is ignored).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn read_request(&self, action: &str, params: &[(&str, &str)]) -> reqwest::RequestBuilder {
        self.client
            .get(&self.base_url)
            .query(&[("action", action)])
            .query(params)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<Value>, SyncError> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        open_envelope(&body)
    }

    /// Fetch the inspector's visit history, newest first as served.
    pub async fn get_visits(&self, inspector_id: &str) -> Result<Vec<SchoolVisit>, SyncError> {
        info!(url = %self.base_url, inspector_id, "fetching visits");
        let data = self
            .send(self.read_request("getVisits", &[("inspectorId", inspector_id)]))
            .await?;
        let rows: Vec<Value> = data_as(data)?;
        let visits = wire::decode_visits(rows);
        info!(count = visits.len(), "fetched visits");
        Ok(visits)
    }

    /// Fetch the schools assigned to the inspector.
    pub async fn get_schools(&self, inspector_id: &str) -> Result<Vec<School>, SyncError> {
        info!(url = %self.base_url, inspector_id, "fetching schools");
        let data = self
            .send(self.read_request("getSchools", &[("inspectorId", inspector_id)]))
            .await?;
        let rows: Vec<Value> = data_as(data)?;
        let total = rows.len();
        let schools = wire::decode_schools(rows);
        info!(count = schools.len(), total, "fetched schools");
        Ok(schools)
    }

    /// Fetch the inspector's profile.
    pub async fn get_user(&self, id_pengawas: &str) -> Result<InspectorProfile, SyncError> {
        info!(url = %self.base_url, id_pengawas, "fetching inspector profile");
        let data = self
            .send(self.read_request("getUser", &[("id_pengawas", id_pengawas)]))
            .await?;
        let data = data.ok_or_else(|| SyncError::Malformed("getUser returned no data".into()))?;
        Ok(serde_json::from_value(data)?)
    }

    /// Write one finalized visit.
    pub async fn save_visit(&self, visit: &SchoolVisit) -> Result<SubmissionAck, SyncError> {
        info!(url = %self.base_url, visit_id = %visit.id, "saving visit");
        let body = json!({ "action": "saveVisit", "data": visit });
        let resp = self.client.post(&self.base_url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SyncError::Server {
                status: status.as_u16(),
                body: text,
            });
        }

        // Some deployments answer writes with a redirect page instead of an
        // envelope; a 2xx without an envelope counts as accepted.
        let message = match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) if !envelope.is_success() => {
                return Err(SyncError::Service(
                    envelope.message.unwrap_or_else(|| "saveVisit rejected".into()),
                ));
            }
            Ok(envelope) => envelope.message,
            Err(_) => {
                debug!(bytes = text.len(), "saveVisit reply carried no envelope");
                None
            }
        };
        info!(visit_id = %visit.id, "visit saved");
        Ok(SubmissionAck {
            visit_id: visit.id.clone(),
            message,
        })
    }
}

#[async_trait]
impl SubmissionSink for DataServiceClient {
    type Error = SyncError;

    async fn submit(&self, visit: &SchoolVisit) -> Result<SubmissionAck, SyncError> {
        self.save_visit(visit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = DataServiceClient::new("https://example.test/exec/".into());
        assert_eq!(client.base_url(), "https://example.test/exec");
    }

    #[test]
    fn read_request_carries_action_and_params() {
        let client = DataServiceClient::new("https://example.test/exec".into());
        let request = client
            .read_request("getVisits", &[("inspectorId", "P 01")])
            .build()
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://example.test/exec?action=getVisits&inspectorId=P+01"
        );
    }

    #[test]
    fn success_envelope_yields_data() {
        let data = open_envelope(r#"{"status":"success","data":[1,2]}"#).unwrap();
        assert_eq!(data, Some(json!([1, 2])));
        let empty: Vec<Value> = data_as(open_envelope(r#"{"status":"success"}"#).unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn error_envelope_carries_message() {
        let err = open_envelope(r#"{"status":"error","message":"Sheet not found"}"#).unwrap_err();
        assert!(matches!(err, SyncError::Service(ref m) if m == "Sheet not found"));
    }

    #[test]
    fn non_json_reply_is_a_parse_error() {
        assert!(matches!(
            open_envelope("<html>moved</html>"),
            Err(SyncError::Json(_))
        ));
    }
}
