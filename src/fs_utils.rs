//! Filesystem helpers for sink destinations.

use crate::errors::{StepLogError, StepLogResult};
use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Make sure `dir` exists; when `refresh` is set, discard everything inside it.
pub fn prepare_dir(dir: &Path, refresh: bool) -> StepLogResult<()> {
    fs::create_dir_all(dir).map_err(|e| StepLogError::io("creating log directory", e))?;
    if !refresh {
        return Ok(());
    }

    let entries = fs::read_dir(dir).map_err(|e| StepLogError::io("listing log directory", e))?;
    for entry in entries {
        let path = entry
            .map_err(|e| StepLogError::io("listing log directory", e))?
            .path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| StepLogError::io(format!("refreshing {}", path.display()), e))?;
    }
    tracing::debug!("Refreshed directory {}", dir.display());
    Ok(())
}

/// Short, collision-resistant name derived from a construction timestamp.
pub fn timestamp_stem(at: DateTime<Local>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}
