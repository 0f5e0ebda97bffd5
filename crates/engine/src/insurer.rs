//! Insurer collaborator
//!
//! Submissions never fail: transport and decoding errors come back as an
//! error-shaped `InsurerResponse`.

use crate::state::IncidentRecord;
use async_trait::async_trait;
use esr_common::config::InsurerConfig;
use esr_common::errors::{AppError, Result};
use esr_common::metrics;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Clause returned by demo insurer bases
pub const MOCK_CLAUSE: &str = "Spills of toxic materials must be reported in 24h; form INS-24.";

/// Base URLs containing this marker are answered locally
const MOCK_BASE_MARKER: &str = "mockinsurer";

/// What is sent to the insurer
#[derive(Debug, Clone)]
pub enum InsurerRequest {
    /// Clause lookup for a free-text task
    Clause { query: String },
    /// Claim submission for a structured incident
    Claim(IncidentRecord),
}

/// Insurer answer or error marker
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InsurerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,

    /// Full response body when it came from the network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsurerResponse {
    pub fn clause(text: impl Into<String>) -> Self {
        Self {
            clause: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Build from a JSON body, picking up a top-level `clause` string
    pub fn from_body(body: serde_json::Value) -> Self {
        let clause = body.get("clause").and_then(|c| c.as_str()).map(str::to_string);
        Self {
            clause,
            raw: Some(body),
            error: None,
        }
    }
}

/// Trait for insurer integrations
#[async_trait]
pub trait InsurerClient: Send + Sync {
    /// Submit a request. Never fails.
    async fn submit(&self, request: &InsurerRequest) -> InsurerResponse;

    /// Client name for logs
    fn name(&self) -> &str;
}

/// HTTP insurer API client
pub struct HttpInsurerClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl HttpInsurerClient {
    pub fn new(config: &InsurerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build insurer HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn is_mock(&self) -> bool {
        self.api_base.contains(MOCK_BASE_MARKER)
    }

    async fn send(&self, request: &InsurerRequest) -> Result<serde_json::Value> {
        let builder = match request {
            InsurerRequest::Clause { .. } => self.client.get(format!("{}/v1/clauses", self.api_base)),
            InsurerRequest::Claim(incident) => self
                .client
                .post(format!("{}/v1/claims", self.api_base))
                .json(incident),
        };

        let builder = match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        };

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(AppError::InsurerError {
                message: format!("Insurer API returned {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl InsurerClient for HttpInsurerClient {
    async fn submit(&self, request: &InsurerRequest) -> InsurerResponse {
        if self.is_mock() {
            return InsurerResponse::clause(MOCK_CLAUSE);
        }

        match self.send(request).await {
            Ok(body) => {
                metrics::record_external_call("insurer", true);
                InsurerResponse::from_body(body)
            }
            Err(e) => {
                metrics::record_external_call("insurer", false);
                tracing::warn!(error = %e, base = %self.api_base, "Insurer call failed");
                InsurerResponse::error(e.to_string())
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Canned insurer for tests and offline runs
pub struct MockInsurerClient {
    response: InsurerResponse,
    calls: AtomicUsize,
}

impl MockInsurerClient {
    /// Always answer with the demo clause
    pub fn new() -> Self {
        Self::with_response(InsurerResponse::clause(MOCK_CLAUSE))
    }

    pub fn with_response(response: InsurerResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with an error marker
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_response(InsurerResponse::error(message))
    }

    /// Number of submissions received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockInsurerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsurerClient for MockInsurerClient {
    async fn submit(&self, _request: &InsurerRequest) -> InsurerResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> InsurerConfig {
        InsurerConfig {
            api_base: base.to_string(),
            api_key: None,
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_mock_base_returns_clause() {
        let client = HttpInsurerClient::new(&config("https://api.mockinsurer.local")).unwrap();
        let response = client
            .submit(&InsurerRequest::Clause { query: "CLAUSE".to_string() })
            .await;
        assert_eq!(response.clause.as_deref(), Some(MOCK_CLAUSE));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_base_is_error_shaped() {
        let client = HttpInsurerClient::new(&config("http://127.0.0.1:9")).unwrap();
        let response = client
            .submit(&InsurerRequest::Claim(IncidentRecord::default()))
            .await;
        assert!(response.error.is_some());
        assert!(response.clause.is_none());
    }

    #[test]
    fn test_from_body_extracts_clause() {
        let response = InsurerResponse::from_body(serde_json::json!({"clause": "Form A", "id": 7}));
        assert_eq!(response.clause.as_deref(), Some("Form A"));
        assert_eq!(response.raw.unwrap()["id"], 7);

        let response = InsurerResponse::from_body(serde_json::json!({"claim_id": "X"}));
        assert!(response.clause.is_none());
    }

    #[tokio::test]
    async fn test_mock_client_counts_calls() {
        let client = MockInsurerClient::failing("down");
        let response = client
            .submit(&InsurerRequest::Clause { query: "q".to_string() })
            .await;
        assert_eq!(response.error.as_deref(), Some("down"));
        assert_eq!(client.calls(), 1);
    }
}
