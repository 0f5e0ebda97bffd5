//! Audit sink
//!
//! Append-only structured entries: a UTC timestamp, an event name and any
//! event fields. Write failures are reported to the caller, which logs
//! them and carries on.

use async_trait::async_trait;
use chrono::Utc;
use esr_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Timestamp layout used in audit entries
pub const AUDIT_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub ts: String,
    pub event: String,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl AuditEntry {
    /// New entry stamped with the current UTC time
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            ts: Utc::now().format(AUDIT_TS_FORMAT).to_string(),
            event: event.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Attach a field. Values that fail to serialize are stored as null.
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// Trait for audit destinations
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry
    async fn append(&self, entry: &AuditEntry) -> Result<()>;
}

/// JSON Lines file sink. Appends are serialized so concurrent runs never
/// interleave within a line.
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::AuditError {
                message: format!("Failed to open {}: {}", self.path.display(), e),
            })?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::AuditError {
                message: format!("Failed to write {}: {}", self.path.display(), e),
            })?;
        file.flush().await?;

        Ok(())
    }
}

/// In-memory sink for tests
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| AppError::AuditError {
                message: "audit buffer poisoned".to_string(),
            })?
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_shape() {
        let entry = AuditEntry::new("workflow_complete").with("container", "C-456");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["event"], "workflow_complete");
        assert_eq!(json["container"], "C-456");
        let ts = json["ts"].as_str().unwrap();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit.jsonl"));

        sink.append(&AuditEntry::new("first")).await.unwrap();
        sink.append(&AuditEntry::new("second").with("n", 2)).await.unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.event, "second");
        assert_eq!(second.fields["n"], 2);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path());
        let err = sink.append(&AuditEntry::new("x")).await.unwrap_err();
        assert!(matches!(err, AppError::AuditError { .. }));
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        sink.append(&AuditEntry::new("x")).await.unwrap();
        assert_eq!(sink.entries().len(), 1);
    }
}
