//! Normalized probe output.
//!
//! An [`Observation`] is what one probe saw of one system of record during a
//! single run. It is immutable once constructed; the only way to build one is
//! through [`Observation::new`], which enforces the confidence range.

use crate::core::error::RealityError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fact values are plain JSON so probes can report booleans, counts, names
/// or structured summaries with one vocabulary.
pub type FactValue = Value;

/// Ordered fact map. Ordering keeps reports and diffs deterministic.
pub type Facts = BTreeMap<String, FactValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    source: String,
    facts: Facts,
    confidence: f64,
    observed_at: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    limitations: Vec<String>,
}

impl Observation {
    pub fn new(
        source: &str,
        facts: Facts,
        confidence: f64,
        observed_at: u64,
    ) -> Result<Self, RealityError> {
        if source.trim().is_empty() {
            return Err(RealityError::ValidationError(
                "Observation source id must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RealityError::ValidationError(format!(
                "Observation confidence for '{}' must be within [0, 1], got {}",
                source, confidence
            )));
        }
        Ok(Self {
            source: source.to_string(),
            facts,
            confidence,
            observed_at,
            limitations: Vec::new(),
        })
    }

    /// Attach the limitations a probe ran into (skipped directories, missing tools).
    pub fn with_limitations(mut self, limitations: Vec<String>) -> Self {
        self.limitations = limitations;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    pub fn fact(&self, name: &str) -> Option<&FactValue> {
        self.facts.get(name)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn observed_at(&self) -> u64 {
        self.observed_at
    }

    pub fn limitations(&self) -> &[String] {
        &self.limitations
    }
}

/// Wire shape emitted by external connectors and snapshot files.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorPayload {
    pub confidence: f64,
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub observed_at: Option<u64>,
}

impl ConnectorPayload {
    pub fn parse(source: &str, raw: &str) -> Result<Self, RealityError> {
        serde_json::from_str(raw).map_err(|e| {
            RealityError::ValidationError(format!(
                "Probe '{}' produced malformed output: {}",
                source, e
            ))
        })
    }

    pub fn into_observation(self, source: &str, now: u64) -> Result<Observation, RealityError> {
        let observed_at = self.observed_at.unwrap_or(now);
        Ok(Observation::new(source, self.facts, self.confidence, observed_at)?
            .with_limitations(self.limitations))
    }
}

/// Convenience for building fact maps in probes and tests.
#[macro_export]
macro_rules! facts {
    ($($name:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::core::observation::Facts::new();
        $( map.insert($name.to_string(), serde_json::json!($value)); )*
        map
    }};
}
