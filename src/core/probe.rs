//! Source probe contract.
//!
//! A probe performs a read-only query against exactly one system of record
//! and normalizes what it saw into an [`Observation`]. Probes never mutate the
//! systems they look at. Facts are shared vocabulary across probes: two probes
//! reporting `branch` must mean the same real-world property.

use crate::core::error::RealityError;
use crate::core::observation::Observation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-probe timeout, matching the connectors' request timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub trait Probe: Send + Sync {
    /// Source identifier used for trust ranking and report metadata.
    fn id(&self) -> &str;

    /// Probe kind label (`filesystem`, `git`, `command`, ...).
    fn kind(&self) -> &'static str;

    fn timeout(&self) -> Duration {
        DEFAULT_PROBE_TIMEOUT
    }

    /// Query the system of record. Fails with `ProbeUnavailable` when the
    /// system cannot be reached; timeouts are enforced by the runner.
    fn observe(&self) -> Result<Observation, RealityError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ok,
    Unavailable,
    Timeout,
    /// Probe answered but its output could not be used.
    Invalid,
    /// Probe was still pending when the run quorum was reached.
    Skipped,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Timeout => write!(f, "timeout"),
            Self::Invalid => write!(f, "invalid"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl ProbeStatus {
    pub fn from_error(err: &RealityError) -> Self {
        match err {
            RealityError::ProbeTimeout { .. } => Self::Timeout,
            RealityError::ValidationError(_) | RealityError::JsonError(_) => Self::Invalid,
            _ => Self::Unavailable,
        }
    }
}

/// Per-source metadata carried in every report, including failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub kind: String,
    pub status: ProbeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limitations: Vec<String>,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

/// Outcome of one probe within a run.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub source: String,
    pub kind: String,
    pub status: ProbeStatus,
    pub observation: Option<Observation>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl ProbeOutcome {
    pub fn from_result(
        source: &str,
        kind: &str,
        result: Result<Observation, RealityError>,
        elapsed_ms: u64,
    ) -> Self {
        match result {
            Ok(observation) if observation.source() == source => Self {
                source: source.to_string(),
                kind: kind.to_string(),
                status: ProbeStatus::Ok,
                observation: Some(observation),
                error: None,
                elapsed_ms,
            },
            Ok(observation) => Self::failed(
                source,
                kind,
                ProbeStatus::Invalid,
                format!(
                    "probe reported observation for '{}' instead of itself",
                    observation.source()
                ),
                elapsed_ms,
            ),
            Err(err) => Self::failed(
                source,
                kind,
                ProbeStatus::from_error(&err),
                err.to_string(),
                elapsed_ms,
            ),
        }
    }

    pub fn failed(
        source: &str,
        kind: &str,
        status: ProbeStatus,
        error: String,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            source: source.to_string(),
            kind: kind.to_string(),
            status,
            observation: None,
            error: Some(error),
            elapsed_ms,
        }
    }

    pub fn source_report(&self) -> SourceReport {
        SourceReport {
            source: self.source.clone(),
            kind: self.kind.clone(),
            status: self.status,
            confidence: self.observation.as_ref().map(|o| o.confidence()),
            error: self.error.clone(),
            elapsed_ms: self.elapsed_ms,
            limitations: self
                .observation
                .as_ref()
                .map(|o| o.limitations().to_vec())
                .unwrap_or_default(),
        }
    }
}
