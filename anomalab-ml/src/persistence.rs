//! Atomic file output for result artifacts.
//!
//! Artifacts are written to a sibling temp file and renamed into place.

use crate::error::MlError;
use std::path::{Path, PathBuf};

/// Atomically write serializable data as pretty-printed JSON.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), MlError> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes, creating parent directories as needed.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), MlError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and deserialize JSON. Returns `Ok(None)` when the file is absent.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, MlError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

// `trials.json` -> `trials.json.tmp`, keeping the original extension visible.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
