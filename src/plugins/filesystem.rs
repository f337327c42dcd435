//! Filesystem probe.
//!
//! Reports what the working tree itself says: access, tree size, tracked
//! paths and their content digests, and the branch recorded in `.git/HEAD`.
//! Top-level entries are walked in parallel; tracked files are hashed in
//! parallel. Secret-looking files are never hashed.

use crate::core::error::RealityError;
use crate::core::observation::{Facts, Observation};
use crate::core::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::core::time;
use rayon::prelude::*;
use regex::Regex;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 10;

const SYSTEM_DIRS: &[&str] = &[".git", "node_modules", "__pycache__", ".vscode", "target", ".reality"];

const NEVER_HASH: &[&str] = &[
    ".env*", "*.pem", "*.key", "*_rsa", "id_rsa*", "*credentials*", "*secret*", "*password*",
    "*token*", "*.keystore", "*.kdbx", "*.p12", "*.sqlite", "*.sqlite3", "*.db",
];

/// Translate a shell-style glob into an anchored regex.
/// `**` crosses directories, `*` and `?` stay within one path segment.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, RealityError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| RealityError::ConfigError(format!("bad glob '{}': {}", pattern, e)))
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Regex>, RealityError> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

/// Matches either the relative path or the bare file name.
fn matches_any(globs: &[Regex], rel_path: &str) -> bool {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    globs.iter().any(|g| g.is_match(rel_path) || g.is_match(name))
}

#[derive(Debug, Default, Clone)]
struct TreeStats {
    files: u64,
    dirs: u64,
    symlinks: u64,
    bytes: u64,
    depth_reached: usize,
    limitations: Vec<String>,
}

impl TreeStats {
    fn merge(mut self, other: TreeStats) -> TreeStats {
        self.files += other.files;
        self.dirs += other.dirs;
        self.symlinks += other.symlinks;
        self.bytes += other.bytes;
        self.depth_reached = self.depth_reached.max(other.depth_reached);
        self.limitations.extend(other.limitations);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FilesystemProbe {
    id: String,
    root: PathBuf,
    paths: Vec<String>,
    ignore: Vec<Regex>,
    max_depth: usize,
    timeout: Duration,
}

impl FilesystemProbe {
    pub fn new(id: &str, root: &Path) -> Self {
        Self {
            id: id.to_string(),
            root: root.to_path_buf(),
            paths: Vec::new(),
            ignore: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_ignore(mut self, patterns: &[String]) -> Result<Self, RealityError> {
        self.ignore = compile_globs(patterns)?;
        Ok(self)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn skip(&self, path: &Path, is_dir: bool) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        (is_dir && SYSTEM_DIRS.contains(&name)) || matches_any(&self.ignore, &self.rel(path))
    }

    fn walk(&self, start: &Path, start_depth: usize) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut stack = vec![(start.to_path_buf(), start_depth)];
        while let Some((path, depth)) = stack.pop() {
            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    stats.limitations.push(format!("{}: {}", self.rel(&path), e));
                    continue;
                }
            };
            let ft = meta.file_type();
            if ft.is_symlink() {
                stats.symlinks += 1;
                continue;
            }
            if ft.is_file() {
                stats.files += 1;
                stats.bytes += meta.len();
                continue;
            }
            if !ft.is_dir() {
                continue;
            }
            stats.dirs += 1;
            stats.depth_reached = stats.depth_reached.max(depth);
            if depth >= self.max_depth {
                stats
                    .limitations
                    .push(format!("{}: max depth {} reached", self.rel(&path), self.max_depth));
                continue;
            }
            match fs::read_dir(&path) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let child = entry.path();
                        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                        if !self.skip(&child, is_dir) {
                            stack.push((child, depth + 1));
                        }
                    }
                }
                Err(e) => stats.limitations.push(format!("{}: {}", self.rel(&path), e)),
            }
        }
        stats
    }

    fn head_branch(&self) -> Result<Option<String>, String> {
        let dot_git = self.root.join(".git");
        if dot_git.is_file() {
            return Err("worktree .git file; branch not read".to_string());
        }
        let head_path = dot_git.join("HEAD");
        if !head_path.exists() {
            return Ok(None);
        }
        let head = fs::read_to_string(&head_path).map_err(|e| format!(".git/HEAD: {}", e))?;
        let head = head.trim();
        Ok(Some(
            head.strip_prefix("ref: refs/heads/")
                .map(|b| b.to_string())
                .unwrap_or_else(|| "HEAD".to_string()),
        ))
    }
}

fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

impl Probe for FilesystemProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "filesystem"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn observe(&self) -> Result<Observation, RealityError> {
        if !self.root.exists() {
            return Err(RealityError::unavailable(
                &self.id,
                format!("root path does not exist: {}", self.root.display()),
            ));
        }
        if !self.root.is_dir() {
            return Err(RealityError::unavailable(
                &self.id,
                format!("root path is not a directory: {}", self.root.display()),
            ));
        }
        let top_level: Vec<PathBuf> = fs::read_dir(&self.root)
            .map_err(|e| RealityError::unavailable(&self.id, format!("cannot list root: {}", e)))?
            .flatten()
            .filter(|e| {
                let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !self.skip(&e.path(), is_dir)
            })
            .map(|e| e.path())
            .collect();

        let stats = top_level
            .par_iter()
            .map(|p| self.walk(p, 1))
            .reduce(TreeStats::default, TreeStats::merge);

        let writable = fs::metadata(&self.root)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false);

        let mut facts = Facts::new();
        facts.insert("root_readable".to_string(), json!(true));
        facts.insert("root_writable".to_string(), json!(writable));
        facts.insert("file_count".to_string(), json!(stats.files));
        facts.insert("dir_count".to_string(), json!(stats.dirs));
        facts.insert("symlink_count".to_string(), json!(stats.symlinks));
        facts.insert("total_size_bytes".to_string(), json!(stats.bytes));
        facts.insert("max_depth_reached".to_string(), json!(stats.depth_reached));
        facts.insert(
            "git_repository".to_string(),
            json!(self.root.join(".git").exists()),
        );

        let mut limitations = stats.limitations;
        match self.head_branch() {
            Ok(Some(branch)) => {
                facts.insert("branch".to_string(), json!(branch));
            }
            Ok(None) => {}
            Err(note) => limitations.push(note),
        }

        let never_hash = compile_globs(&NEVER_HASH.iter().map(|s| s.to_string()).collect::<Vec<_>>())?;
        let tracked: Vec<(String, bool, Option<Result<String, String>>)> = self
            .paths
            .par_iter()
            .map(|rel| {
                let full = self.root.join(rel);
                let exists = full.exists();
                let digest = (full.is_file() && !matches_any(&never_hash, rel))
                    .then(|| sha256_file(&full).map_err(|e| format!("{}: {}", rel, e)));
                (rel.clone(), exists, digest)
            })
            .collect();
        for (rel, exists, digest) in tracked {
            facts.insert(format!("exists:{}", rel), json!(exists));
            match digest {
                Some(Ok(hex)) => {
                    facts.insert(format!("sha256:{}", rel), json!(hex));
                }
                Some(Err(note)) => limitations.push(note),
                None => {}
            }
        }

        let confidence = if limitations.is_empty() { 1.0 } else { 0.8 };
        Ok(Observation::new(&self.id, facts, confidence, time::now_epoch_secs())?
            .with_limitations(limitations))
    }
}
