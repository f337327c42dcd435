//! Git probe: asks the `git` binary about the working copy.

use crate::core::error::RealityError;
use crate::core::events::redact_string;
use crate::core::observation::{Facts, Observation};
use crate::core::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::core::time;
use crate::plugins::command::{deadline_after, run_until};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

const BASE_CONFIDENCE: f64 = 0.3;
const STEP_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct GitProbe {
    id: String,
    root: PathBuf,
    timeout: Duration,
}

impl GitProbe {
    pub fn new(id: &str, root: &Path) -> Self {
        Self {
            id: id.to_string(),
            root: root.to_path_buf(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `git -C <root> <args>`; `Ok(None)` when git exits non-zero.
    /// Git is killed once `deadline` passes and never prompts for credentials.
    fn git(&self, args: &[&str], deadline: Instant) -> Result<Option<String>, RealityError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.root)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");
        let finished = run_until(&mut cmd, deadline)
            .map_err(|e| RealityError::unavailable(&self.id, format!("git not runnable: {}", e)))?
            .ok_or_else(|| RealityError::ProbeTimeout {
                source_id: self.id.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?;
        if !finished.status.success() {
            return Ok(None);
        }
        Ok(Some(finished.stdout.trim().to_string()))
    }
}

impl Probe for GitProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "git"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn observe(&self) -> Result<Observation, RealityError> {
        let deadline = deadline_after(self.timeout);
        if !self.root.is_dir() {
            return Err(RealityError::unavailable(
                &self.id,
                format!("not a directory: {}", self.root.display()),
            ));
        }
        match self.git(&["rev-parse", "--is-inside-work-tree"], deadline)? {
            Some(ref out) if out == "true" => {}
            _ => {
                return Err(RealityError::unavailable(
                    &self.id,
                    format!("not a git work tree: {}", self.root.display()),
                ));
            }
        }

        let mut facts = Facts::new();
        let mut limitations = Vec::new();
        let mut confidence = BASE_CONFIDENCE;
        facts.insert("git_repository".to_string(), json!(true));

        match self.git(&["symbolic-ref", "--short", "-q", "HEAD"], deadline)? {
            Some(branch) if !branch.is_empty() => {
                facts.insert("branch".to_string(), json!(branch));
            }
            _ => {
                facts.insert("branch".to_string(), json!("HEAD"));
                limitations.push("detached HEAD".to_string());
            }
        }

        match self.git(&["rev-parse", "--verify", "-q", "HEAD"], deadline)? {
            Some(commit) if !commit.is_empty() => {
                facts.insert("head_commit".to_string(), json!(commit));
                confidence += STEP_CONFIDENCE;
            }
            _ => limitations.push("HEAD does not resolve to a commit".to_string()),
        }

        match self.git(&["remote", "get-url", "origin"], deadline)? {
            Some(url) if !url.is_empty() => {
                facts.insert("remote_url".to_string(), json!(redact_string(&url)));
                confidence += STEP_CONFIDENCE;
            }
            _ => limitations.push("no origin remote".to_string()),
        }

        match self.git(&["status", "--porcelain"], deadline)? {
            Some(status) => {
                let dirty = status.lines().filter(|l| !l.trim().is_empty()).count();
                facts.insert("dirty_files".to_string(), json!(dirty));
            }
            None => limitations.push("git status failed".to_string()),
        }

        Ok(Observation::new(&self.id, facts, confidence.min(1.0), time::now_epoch_secs())?
            .with_limitations(limitations))
    }
}
