//! Built-in source probes.
//!
//! - `filesystem`: what the working tree says
//! - `git`: what the git binary says about the working copy
//! - `command`: external connectors (GitHub, Supabase, Vercel) speaking JSON
//! - `snapshot`: observations exported to a file

pub mod command;
pub mod filesystem;
pub mod git;
pub mod snapshot;

use crate::core::config::{ProbeDef, ProbeKind, RealityConfig};
use crate::core::error::RealityError;
use crate::core::probe::Probe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn resolve(project_root: &Path, path: Option<&PathBuf>) -> PathBuf {
    match path {
        Some(p) if p.is_absolute() => p.clone(),
        Some(p) => project_root.join(p),
        None => project_root.to_path_buf(),
    }
}

/// Instantiate one probe from its config entry. Paths are relative to the
/// project root.
pub fn build_probe(def: &ProbeDef, project_root: &Path) -> Result<Arc<dyn Probe>, RealityError> {
    let timeout = def.timeout();
    let probe: Arc<dyn Probe> = match def.kind {
        ProbeKind::Filesystem => {
            let mut probe = filesystem::FilesystemProbe::new(&def.id, &resolve(project_root, def.root.as_ref()))
                .with_paths(def.paths.clone())
                .with_ignore(&def.ignore)?
                .with_timeout(timeout);
            if let Some(depth) = def.max_depth {
                probe = probe.with_max_depth(depth);
            }
            Arc::new(probe)
        }
        ProbeKind::Git => Arc::new(
            git::GitProbe::new(&def.id, &resolve(project_root, def.root.as_ref())).with_timeout(timeout),
        ),
        ProbeKind::Command => {
            let program = def.command.as_deref().ok_or_else(|| {
                RealityError::ConfigError(format!("probe '{}': command probes need `command`", def.id))
            })?;
            Arc::new(
                command::CommandProbe::new(&def.id, program, &resolve(project_root, def.root.as_ref()))
                    .with_args(def.args.clone())
                    .with_timeout(timeout),
            )
        }
        ProbeKind::Snapshot => {
            let file = def.file.as_ref().ok_or_else(|| {
                RealityError::ConfigError(format!("probe '{}': snapshot probes need `file`", def.id))
            })?;
            Arc::new(
                snapshot::SnapshotProbe::new(&def.id, &resolve(project_root, Some(file)))
                    .with_timeout(timeout),
            )
        }
    };
    Ok(probe)
}

pub fn build_probes(
    config: &RealityConfig,
    project_root: &Path,
) -> Result<Vec<Arc<dyn Probe>>, RealityError> {
    config
        .probe
        .iter()
        .map(|def| build_probe(def, project_root))
        .collect()
}
