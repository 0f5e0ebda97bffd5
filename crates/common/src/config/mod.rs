//! Configuration management for ESR Orchestrator
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{env}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Data source locations
    #[serde(default)]
    pub data: DataConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Workflow behaviour
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// External classifier (LLM) configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Insurer collaborator configuration
    #[serde(default)]
    pub insurer: InsurerConfig,

    /// Audit sink configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Waste tracking CSV (batch_id, container_id, material, quantity_kg, ...)
    #[serde(default = "default_waste_csv")]
    pub waste_csv: PathBuf,

    /// Line-oriented regulation clauses file
    #[serde(default = "default_regulations")]
    pub regulations: PathBuf,

    /// Root directory scanned for .txt/.md documents
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

/// How the engine moves between steps
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// Fixed edges, every step runs once in canonical order
    #[default]
    Static,
    /// Router follows the resolved plan, skipping absent steps
    Dynamic,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Static => f.write_str("static"),
            Discipline::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// How the plan is resolved
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// Canonical step order
    #[default]
    Static,
    /// External classifier proposes the tools
    Classifier,
}

impl fmt::Display for PlannerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerMode::Static => f.write_str("static"),
            PlannerMode::Classifier => f.write_str("classifier"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Transition discipline
    #[serde(default)]
    pub discipline: Discipline,

    /// Plan resolution mode
    #[serde(default)]
    pub planner: PlannerMode,

    /// Query used by the document search step
    #[serde(default = "default_doc_query")]
    pub doc_query: String,

    /// Number of documents returned by the document search step
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Container used when the task mentions none
    #[serde(default)]
    pub default_container: Option<String>,

    /// Ask the classifier for a report narrative (classifier planner only)
    #[serde(default)]
    pub ai_report_narrative: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key (offline classifier when absent)
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum output tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsurerConfig {
    /// Insurer API base URL
    #[serde(default = "default_insurer_base")]
    pub api_base: String,

    /// Bearer token for the insurer API
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_insurer_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Append-only JSON Lines file
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8010 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_waste_csv() -> PathBuf { PathBuf::from("data/sample_waste_data.csv") }
fn default_regulations() -> PathBuf { PathBuf::from("data/regulations/ISO14001_clauses.txt") }
fn default_corpus_dir() -> PathBuf { PathBuf::from("data") }
fn default_embedding_provider() -> String { crate::DEFAULT_EMBEDDING_PROVIDER.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_doc_query() -> String { "ISO 14001 spills toxic time window".to_string() }
fn default_top_k() -> usize { 5 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 30 }
fn default_llm_max_tokens() -> usize { 1000 }
fn default_llm_temperature() -> f32 { 0.1 }
fn default_insurer_base() -> String { "https://api.mockinsurer.local".to_string() }
fn default_insurer_timeout() -> u64 { 10 }
fn default_audit_path() -> PathBuf { PathBuf::from("audit_log.jsonl") }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "esr-orchestrator".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__WORKFLOW__DISCIPLINE=dynamic
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            waste_csv: default_waste_csv(),
            regulations: default_regulations(),
            corpus_dir: default_corpus_dir(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            discipline: Discipline::default(),
            planner: PlannerMode::default(),
            doc_query: default_doc_query(),
            top_k: default_top_k(),
            default_container: None,
            ai_report_narrative: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
        }
    }
}

impl Default for InsurerConfig {
    fn default() -> Self {
        Self {
            api_base: default_insurer_base(),
            api_key: None,
            timeout_secs: default_insurer_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            embedding: EmbeddingConfig::default(),
            workflow: WorkflowConfig::default(),
            llm: LlmConfig::default(),
            insurer: InsurerConfig::default(),
            audit: AuditConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
