//! `reality.toml` loading.
//!
//! Resolution order: `$REALITY_CONFIG`, then `<project>/.reality/reality.toml`,
//! then the embedded template.

use crate::core::assets;
use crate::core::consensus::{Aggregator, ScoringMode};
use crate::core::error::RealityError;
use crate::core::gate::GateThresholds;
use crate::core::probe::DEFAULT_PROBE_TIMEOUT;
use crate::core::runner::{DEFAULT_RUN_TIMEOUT, RunOptions};
use crate::core::trust::TrustHierarchy;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const REALITY_DIR: &str = ".reality";
pub const CONFIG_FILE: &str = "reality.toml";
pub const DATA_DIR: &str = "data";
pub const CONFIG_ENV: &str = "REALITY_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Highest trust first.
    pub order: Vec<String>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            order: ["github", "git", "filesystem", "supabase", "vercel"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub timeout_secs: u64,
    pub quorum: Option<usize>,
    pub scoring: ScoringMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_RUN_TIMEOUT.as_secs(),
            quorum: None,
            scoring: ScoringMode::Unweighted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Filesystem,
    Git,
    Command,
    Snapshot,
}

/// A probe definition from reality.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeDef {
    pub id: String,
    pub kind: ProbeKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// filesystem / git: directory to inspect, relative to the project root.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// filesystem: tracked paths reported as `exists:<path>` / `sha256:<path>`.
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// command: connector executable and arguments.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// snapshot: exported observation file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl ProbeDef {
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RealityConfig {
    pub trust: TrustConfig,
    pub run: RunConfig,
    pub gate: GateThresholds,
    pub probe: Vec<ProbeDef>,
}

impl RealityConfig {
    pub fn parse(content: &str) -> Result<Self, RealityError> {
        let config: RealityConfig =
            toml::from_str(content).map_err(|e| RealityError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in configuration from the embedded template.
    pub fn builtin() -> Result<Self, RealityError> {
        let template = assets::get_template(assets::CONFIG_TEMPLATE).ok_or_else(|| {
            RealityError::NotFound(format!("embedded template {}", assets::CONFIG_TEMPLATE))
        })?;
        Self::parse(&template)
    }

    pub fn validate(&self) -> Result<(), RealityError> {
        self.trust_hierarchy()?;
        if !(0.0..=1.0).contains(&self.gate.min_score) {
            return Err(RealityError::ConfigError(format!(
                "gate.min_score must be within [0, 1], got {}",
                self.gate.min_score
            )));
        }
        if self.run.timeout_secs == 0 {
            return Err(RealityError::ConfigError(
                "run.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.run.quorum == Some(0) {
            return Err(RealityError::ConfigError(
                "run.quorum must be at least 1 when set".to_string(),
            ));
        }
        let mut seen = FxHashSet::default();
        for def in &self.probe {
            if def.id.trim().is_empty() {
                return Err(RealityError::ConfigError("probe id must not be empty".to_string()));
            }
            if def.timeout_secs == Some(0) {
                return Err(RealityError::ConfigError(format!(
                    "probe '{}': timeout_secs must be greater than zero",
                    def.id
                )));
            }
            if !seen.insert(def.id.as_str()) {
                return Err(RealityError::ConfigError(format!(
                    "probe id '{}' is defined more than once",
                    def.id
                )));
            }
        }
        Ok(())
    }

    pub fn trust_hierarchy(&self) -> Result<TrustHierarchy, RealityError> {
        TrustHierarchy::new(self.trust.order.iter().cloned())
    }

    pub fn aggregator(&self) -> Result<Aggregator, RealityError> {
        Ok(Aggregator::new(self.trust_hierarchy()?, self.run.scoring))
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            run_timeout: Duration::from_secs(self.run.timeout_secs),
            quorum: self.run.quorum,
        }
    }
}

pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(REALITY_DIR).join(CONFIG_FILE)
}

pub fn data_dir(project_root: &Path) -> PathBuf {
    project_root.join(REALITY_DIR).join(DATA_DIR)
}

/// Load config for a project, falling back to the embedded template.
pub fn load_config(project_root: &Path) -> Result<RealityConfig, RealityError> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(explicit);
        let content = fs::read_to_string(&path).map_err(|e| {
            RealityError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        return RealityConfig::parse(&content);
    }

    let path = config_path(project_root);
    if path.exists() {
        let content = fs::read_to_string(&path)?;
        return RealityConfig::parse(&content);
    }

    RealityConfig::builtin()
}

/// Walk up from `start_dir` to the directory holding `.reality/`.
pub fn find_project_root(start_dir: &Path) -> Result<PathBuf, RealityError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(REALITY_DIR).exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(RealityError::NotFound(
                "'.reality' directory not found in current or parent directories. Run `reality init` first.".to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_template_parses() {
        let config = RealityConfig::builtin().unwrap();
        assert_eq!(config.trust.order[0], "github");
        assert_eq!(config.run.timeout_secs, 30);
        assert_eq!(config.gate.max_age_secs, 86_400);
        let ids: Vec<_> = config.probe.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["filesystem", "git"]);
    }

    #[test]
    fn sections_default_when_omitted() {
        let config = RealityConfig::parse(
            r#"
[[probe]]
id = "db"
kind = "snapshot"
file = "db.json"
"#,
        )
        .unwrap();
        assert_eq!(config.trust, TrustConfig::default());
        assert_eq!(config.gate, GateThresholds::default());
        assert_eq!(config.probe[0].kind, ProbeKind::Snapshot);
        assert_eq!(config.probe[0].timeout(), DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn rejects_duplicate_probe_ids() {
        let err = RealityConfig::parse(
            r#"
[[probe]]
id = "fs"
kind = "filesystem"

[[probe]]
id = "fs"
kind = "git"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_duplicate_trust_entries_and_bad_scores() {
        assert!(RealityConfig::parse("[trust]\norder = [\"a\", \"a\"]\n").is_err());
        assert!(RealityConfig::parse("[gate]\nmin_score = 1.5\n").is_err());
        assert!(RealityConfig::parse("[run]\nscoring = \"median\"\n").is_err());
    }

    #[test]
    fn rejects_zero_quorum_and_zero_probe_timeout() {
        let err = RealityConfig::parse("[run]\nquorum = 0\n").unwrap_err();
        assert!(matches!(err, RealityError::ConfigError(_)));
        assert!(err.to_string().contains("quorum"));

        let err = RealityConfig::parse(
            r#"
[[probe]]
id = "fs"
kind = "filesystem"
timeout_secs = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        assert!(RealityConfig::parse("[run]\nquorum = 1\n").is_ok());
    }

    #[test]
    fn confidence_scoring_parses() {
        let config = RealityConfig::parse("[run]\nscoring = \"confidence\"\nquorum = 2\n").unwrap();
        assert_eq!(config.run.scoring, ScoringMode::Confidence);
        assert_eq!(config.run_options().quorum, Some(2));
    }

    #[test]
    fn find_project_root_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(REALITY_DIR)).unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).unwrap(), tmp.path());
    }
}
