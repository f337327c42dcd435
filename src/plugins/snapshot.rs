//! Snapshot probe: an observation exported to a JSON file by some other
//! process (a CI job, a dashboard export). Same shape as connector output.
//! When the file carries no `observed_at`, its modification time is used.

use crate::core::error::RealityError;
use crate::core::observation::{ConnectorPayload, Observation};
use crate::core::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::core::time;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct SnapshotProbe {
    id: String,
    file: PathBuf,
    timeout: Duration,
}

impl SnapshotProbe {
    pub fn new(id: &str, file: &Path) -> Self {
        Self {
            id: id.to_string(),
            file: file.to_path_buf(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Probe for SnapshotProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "snapshot"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn observe(&self) -> Result<Observation, RealityError> {
        let raw = fs::read_to_string(&self.file).map_err(|e| {
            RealityError::unavailable(&self.id, format!("{}: {}", self.file.display(), e))
        })?;
        let modified = fs::metadata(&self.file)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_else(time::now_epoch_secs);
        ConnectorPayload::parse(&self.id, &raw)?.into_observation(&self.id, modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn reads_exported_observation() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("supabase.json");
        fs::write(
            &path,
            r#"{"confidence": 0.7, "facts": {"tables": 12}, "observed_at": 1700000000}"#,
        )
        .unwrap();
        let obs = SnapshotProbe::new("supabase", &path).observe().unwrap();
        assert_eq!(obs.fact("tables"), Some(&json!(12)));
        assert_eq!(obs.observed_at(), 1_700_000_000);
        assert_eq!(obs.confidence(), 0.7);
    }

    #[test]
    fn falls_back_to_file_mtime() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("vercel.json");
        fs::write(&path, r#"{"confidence": 1.0, "facts": {"deployed": true}}"#).unwrap();
        let obs = SnapshotProbe::new("vercel", &path).observe().unwrap();
        let now = time::now_epoch_secs();
        assert!(obs.observed_at() <= now && now - obs.observed_at() < 60);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let tmp = tempdir().unwrap();
        let err = SnapshotProbe::new("vercel", &tmp.path().join("gone.json"))
            .observe()
            .unwrap_err();
        assert!(matches!(err, RealityError::ProbeUnavailable { .. }));
    }
}
