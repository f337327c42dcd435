use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealityError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Probe '{source_id}' unavailable: {reason}")]
    ProbeUnavailable { source_id: String, reason: String },
    #[error("Probe '{source_id}' timed out after {timeout_ms}ms")]
    ProbeTimeout { source_id: String, timeout_ms: u64 },
    #[error("Compliance gate denied: {0}")]
    ComplianceDenied(String),
}

impl RealityError {
    pub fn unavailable(source_id: &str, reason: impl Into<String>) -> Self {
        RealityError::ProbeUnavailable {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}
