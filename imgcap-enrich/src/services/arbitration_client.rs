//! Arbitration client
//!
//! Optional last pass: a text-generation model reconciles the collected
//! signals into one caption. Without a credential arbitration is disabled and
//! returns an empty string. Failures are never fatal to a row; the
//! orchestrator falls back to the plain caption.

use crate::models::Classification;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ARBITRATION_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You write alt text for images on web pages. \
You receive machine-generated signals about one image as JSON: pixel size, a \
caption from a vision model (omitted when known to be unreliable), OCR text, \
an answer to \"what does the logo say?\", and a heuristic image type. The \
signals are noisy and may contradict each other. Reply with a single short, \
literal description of the image and nothing else.";

/// Arbitration errors
#[derive(Debug, Error)]
pub enum ArbitrationError {
    /// HTTP client could not be built (bad key characters, TLS setup)
    #[error("Arbitration client error: {0}")]
    Client(String),

    /// Request failed before a response arrived
    #[error("Arbitration network error: {0}")]
    Network(String),

    /// Endpoint answered with a non-success status
    #[error("Arbitration API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body was not a chat completion
    #[error("Arbitration parse error: {0}")]
    Parse(String),
}

/// Signals sent to the arbitration model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrationPayload {
    pub width: u32,
    pub height: u32,
    /// Withheld for text-bearing images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub ocr: String,
    pub ocr_qa: String,
    pub classification: Classification,
}

/// Final reconciliation over all signals
#[async_trait]
pub trait Arbitrator: Send + Sync {
    /// A credential is configured
    fn is_enabled(&self) -> bool;

    /// Reconciled caption; empty when disabled
    async fn arbitrate(&self, payload: &ArbitrationPayload) -> Result<String, ArbitrationError>;
}

/// Arbitrator used when no credential is configured
pub struct DisabledArbitrator;

#[async_trait]
impl Arbitrator for DisabledArbitrator {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn arbitrate(&self, _payload: &ArbitrationPayload) -> Result<String, ArbitrationError> {
        Ok(String::new())
    }
}

/// Connection settings for [`OpenAiArbitrator`]
#[derive(Clone, PartialEq)]
pub struct ArbitrationConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

// Keeps the key out of logs
impl std::fmt::Debug for ArbitrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAiArbitrator {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiArbitrator {
    pub fn new(config: &ArbitrationConfig) -> Result<Self, ArbitrationError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ArbitrationError::Client("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ArbitrationError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Arbitrator for OpenAiArbitrator {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn arbitrate(&self, payload: &ArbitrationPayload) -> Result<String, ArbitrationError> {
        let signals =
            serde_json::to_string(payload).map_err(|e| ArbitrationError::Parse(e.to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: signals,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ArbitrationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ArbitrationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ArbitrationError::Parse(e.to_string()))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| ArbitrationError::Parse("response has no choices".to_string()))?;

        tracing::debug!(model = %self.model, answer = %answer, "Arbitration answered");
        Ok(answer)
    }
}
