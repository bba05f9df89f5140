//! Atomic JSON output
//!
//! Documents are serialized deterministically and written to `<name>.new`
//! before being renamed into place, so readers never see a partial file.
//! A file whose bytes would not change is left untouched.

use crate::error::{NormalizeError, NormalizeResult};
use serde::Serialize;
use std::path::Path;

/// Serialize a document the way every output file is written
pub fn to_json_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `value` to `path` unless the file already holds the same bytes
///
/// Returns `true` when the file was written.
pub fn write_json_if_changed<T: Serialize>(path: &Path, value: &T) -> NormalizeResult<bool> {
    let bytes = to_json_bytes(value).map_err(|e| output_error(path, e))?;

    if let Ok(existing) = std::fs::read(path) {
        if existing == bytes {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| output_error(path, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".new");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, &bytes).map_err(|e| output_error(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| output_error(path, e))?;
    Ok(true)
}

/// Remove an output file; a file that is already gone is fine
///
/// Returns `true` when a file was removed.
pub fn remove_output(path: &Path) -> NormalizeResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(output_error(path, e)),
    }
}

fn output_error(path: &Path, e: impl std::fmt::Display) -> NormalizeError {
    NormalizeError::Output(path.to_path_buf(), e.to_string())
}
