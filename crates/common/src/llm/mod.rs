//! External text classifier client
//!
//! The classifier is an opaque text-in/text-out collaborator. Callers must
//! tolerate any response, including text that is not JSON at all.
//!
//! Provides:
//! - `ChatClassifier`: OpenAI-compatible chat completions over HTTP
//! - `OfflineClassifier`: canned answer used when no API key is configured
//! - `StaticClassifier`: scripted answer or failure, for tests and demos

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for text classification / generation
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Send a formatted prompt and return the raw response text
    async fn classify(&self, prompt: &str) -> Result<String>;

    /// Provider name used in logs and audit entries
    fn provider(&self) -> &str;
}

/// Chat completions client
pub struct ChatClassifier {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl ChatClassifier {
    /// Create a new chat classifier
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e)
            })?;

        Ok(Self { config, api_key, client })
    }
}

#[async_trait]
impl Classifier for ChatClassifier {
    async fn classify(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are an Environmental, Safety & Risk (ESR) workflow assistant.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self.client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ClassifierError {
                message: format!("request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ClassifierError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await
            .map_err(|e| AppError::ClassifierError {
                message: format!("Failed to parse response: {}", e),
            })?;

        chat_response.choices.into_iter().next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ClassifierError {
                message: "Empty response from classifier".to_string(),
            })
    }

    fn provider(&self) -> &str {
        &self.config.model
    }
}

/// Classifier used when no API key is configured.
///
/// Planning prompts get every mappable tool in a fenced JSON block; any
/// other prompt gets a short fixed narrative.
pub struct OfflineClassifier;

/// Marker the planning prompt carries so the offline classifier can answer it
pub const PLANNING_PROMPT_MARKER: &str = "Respond with a JSON list of required tools";

impl OfflineClassifier {
    fn planning_answer() -> String {
        "```json\n[\"knowledge_graph\", \"vector_store\", \"waste_tracking\", \"compliance_scoring\", \
        \"risk_detection\", \"insurer_api\", \"report_generation\"]\n```".to_string()
    }
}

#[async_trait]
impl Classifier for OfflineClassifier {
    async fn classify(&self, prompt: &str) -> Result<String> {
        if prompt.contains(PLANNING_PROMPT_MARKER) {
            return Ok(Self::planning_answer());
        }

        Ok("Incident summary unavailable: classifier API key not configured.".to_string())
    }

    fn provider(&self) -> &str {
        "offline"
    }
}

/// Scripted classifier: always answers the same text or always fails.
/// Records every prompt it receives.
pub struct StaticClassifier {
    answer: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StaticClassifier {
    /// Always answer `text`
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            answer: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with a classifier transport error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            answer: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn classify(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        self.answer.clone().map_err(|message| AppError::ClassifierError { message })
    }

    fn provider(&self) -> &str {
        "static"
    }
}

/// Create a classifier based on configuration
pub fn create_classifier(config: &LlmConfig) -> Result<Arc<dyn Classifier>> {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => Ok(Arc::new(ChatClassifier::new(config.clone(), key.to_string())?)),
        None => {
            tracing::warn!("LLM API key not configured, using offline classifier");
            Ok(Arc::new(OfflineClassifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_planning_answer() {
        let classifier = OfflineClassifier;
        let prompt = format!("Plan this incident. {}.", PLANNING_PROMPT_MARKER);
        let answer = classifier.classify(&prompt).await.unwrap();
        assert!(answer.starts_with("```json"));
        assert!(answer.contains("\"insurer_api\""));
    }

    #[tokio::test]
    async fn test_static_classifier_records_prompts() {
        let classifier = StaticClassifier::new("[\"risk_detection\"]");
        let answer = classifier.classify("first").await.unwrap();
        assert_eq!(answer, "[\"risk_detection\"]");
        assert_eq!(classifier.prompts(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_static_classifier_failure() {
        let classifier = StaticClassifier::failing("connection reset");
        let err = classifier.classify("prompt").await.unwrap_err();
        assert!(matches!(err, AppError::ClassifierError { .. }));
    }

    #[test]
    fn test_create_without_key_is_offline() {
        let classifier = create_classifier(&LlmConfig::default()).unwrap();
        assert_eq!(classifier.provider(), "offline");
    }

    #[test]
    fn test_create_with_key_is_chat() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let classifier = tokio_test::block_on(async { create_classifier(&config) }).unwrap();
        assert_eq!(classifier.provider(), "gpt-4o-mini");
    }
}
