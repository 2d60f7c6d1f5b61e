//! Client for a Gemini-style `generateContent` endpoint.
//!
//! The public methods never fail: any transport, server, or parse error is
//! logged and replaced by the static fallback text, so advice can be requested
//! from anywhere in the visit flow without blocking it.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::prompts;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("no API key configured")]
    MissingKey,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model returned no text")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Generates advisory text for inspectors.
#[derive(Debug, Clone)]
pub struct Advisor {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl Advisor {
    /// An advisor using the default endpoint and model. Without a key every
    /// request returns the fallback text.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Encouraging follow-up advice for the principal.
    pub async fn empathetic_advice(&self, findings: &[String], actions: &[String]) -> String {
        let prompt = prompts::empathetic_advice(findings, actions);
        self.generate_or(&prompt, prompts::ADVICE_SYSTEM, prompts::ADVICE_FALLBACK)
            .await
    }

    /// A short leadership quote addressed to the inspector.
    pub async fn leadership_quote(&self, name: &str, region: &str) -> String {
        let prompt = prompts::leadership_quote(name, region);
        self.generate_or(&prompt, prompts::QUOTE_SYSTEM, prompts::QUOTE_FALLBACK)
            .await
    }

    async fn generate_or(&self, prompt: &str, system: &str, fallback: &str) -> String {
        match self.generate(prompt, system).await {
            Ok(text) => text,
            Err(AdvisorError::MissingKey) => {
                debug!("advisor not configured; using fallback");
                fallback.to_string()
            }
            Err(e) => {
                warn!(error = %e, "advice generation failed; using fallback");
                fallback.to_string()
            }
        }
    }

    /// Raw generation call.
    pub async fn generate(&self, prompt: &str, system: &str) -> Result<String, AdvisorError> {
        let api_key = self.api_key.as_deref().ok_or(AdvisorError::MissingKey)?;
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });

        info!(model = %self.model, "requesting generated advice");
        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&resp.text().await?)?;
        parsed.text().ok_or(AdvisorError::Empty)
    }
}
