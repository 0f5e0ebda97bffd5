//! ESR Orchestrator Common Library
//!
//! Shared code for all ESR Orchestrator crates including:
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability
//! - Embedding abstraction
//! - External text classifier client

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use llm::Classifier;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding provider
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "hash";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
