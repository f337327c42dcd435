//! External connector probe.
//!
//! Runs a connector executable (GitHub, Supabase, Vercel adapters and the
//! like) that prints one JSON object on stdout:
//!
//! ```json
//! {"confidence": 0.9, "facts": {"branch": "main"}, "limitations": []}
//! ```
//!
//! The child is killed once the probe timeout passes so a hung connector
//! never outlives its run.

use crate::core::error::RealityError;
use crate::core::events::redact_string;
use crate::core::observation::{ConnectorPayload, Observation};
use crate::core::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::core::time;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDERR_TAIL: usize = 400;

#[derive(Debug, Clone)]
pub struct CommandProbe {
    id: String,
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    timeout: Duration,
}

impl CommandProbe {
    pub fn new(id: &str, program: &str, cwd: &Path) -> Self {
        Self {
            id: id.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(u32::MAX as u64))
}

fn read_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// A child process that exited before its deadline.
pub(crate) struct Finished {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn `cmd` with piped output and wait for it until `deadline`.
/// A child still running at the deadline is killed and `Ok(None)` returned.
pub(crate) fn run_until(cmd: &mut Command, deadline: Instant) -> io::Result<Option<Finished>> {
    if Instant::now() >= deadline {
        return Ok(None);
    }
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = read_pipe(child.stdout.take());
    let stderr = read_pipe(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Some(Finished {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    }))
}

fn tail(s: &str, max: usize) -> &str {
    let s = s.trim();
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

impl Probe for CommandProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "command"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn observe(&self) -> Result<Observation, RealityError> {
        let deadline = deadline_after(self.timeout);
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        let finished = run_until(&mut cmd, deadline)
            .map_err(|e| {
                RealityError::unavailable(&self.id, format!("cannot run '{}': {}", self.program, e))
            })?
            .ok_or_else(|| RealityError::ProbeTimeout {
                source_id: self.id.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?;

        if !finished.status.success() {
            return Err(RealityError::unavailable(
                &self.id,
                format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    finished.status,
                    redact_string(tail(&finished.stderr, STDERR_TAIL))
                ),
            ));
        }

        ConnectorPayload::parse(&self.id, &finished.stdout)?
            .into_observation(&self.id, time::now_epoch_secs())
    }
}
