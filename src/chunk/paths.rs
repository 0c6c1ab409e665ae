use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".chunk-reconcile.lock";

#[derive(Debug, Clone)]
pub struct ChunkPaths {
    pub work_dir: PathBuf,
    pub registry_file: PathBuf,
    pub logs_dir: PathBuf,
    pub lock_file: PathBuf,
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

fn current_dir() -> Result<PathBuf> {
    env::current_dir().context("current directory could not be resolved")
}

/// Resolve the working root from the CLI flag, then `CHUNK_TEMP_DIR`, then the
/// current directory.
pub fn resolve_paths(temp_dir: Option<&Path>, registry_file_name: &str) -> Result<ChunkPaths> {
    let work_dir = match temp_dir {
        Some(dir) => dir.to_path_buf(),
        None => env_or_default_path("CHUNK_TEMP_DIR", current_dir()?),
    };
    let work_dir = if work_dir.is_absolute() {
        work_dir
    } else {
        current_dir()?.join(work_dir)
    };

    let registry_file = work_dir.join(registry_file_name);
    let logs_dir = env_or_default_path("CHUNK_LOGS_DIR", work_dir.join(".chunk-reconcile/logs"));
    let lock_file = work_dir.join(LOCK_FILE_NAME);

    Ok(ChunkPaths {
        work_dir,
        registry_file,
        logs_dir,
        lock_file,
    })
}
