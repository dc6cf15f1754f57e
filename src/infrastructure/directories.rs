use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

/// Filesystem locations after startup checks.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    /// Custom intents catalog, `None` when unset or not a readable file.
    pub intents_file: Option<PathBuf>,
}

pub fn ensure_directories(cfg: &DirectoryConfig, intents: Option<&Path>) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    probe_writable(&logs_dir)?;
    Ok(ResolvedPaths {
        logs_dir,
        intents_file: intents.and_then(resolve_file),
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {}", path))?;
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}

fn probe_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(".write-test");
    fs::write(&probe, b"ok")
        .with_context(|| format!("logs directory {} is not writable", dir.display()))?;
    fs::remove_file(&probe)?;
    Ok(())
}

// Logging is not up yet at this point, so problems surface later when the catalog loads.
fn resolve_file(path: &Path) -> Option<PathBuf> {
    let resolved = path.canonicalize().ok()?;
    resolved.is_file().then_some(resolved)
}
