//! Filesystem utilities for atomic ciphertext writes.

use std::io::Write;
use std::path::Path;

use tempfile::Builder;

use crate::error::{Result, TiplineError};

/// Write `data` to `path` through a temp file in the same directory, then rename.
///
/// Readers never observe a partially written envelope: either the old file (if any)
/// or the complete new one. The temp file is removed on every failure path.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(TiplineError::Storage("Invalid output path".to_string())),
    };
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| TiplineError::Storage("Invalid output filename".to_string()))?;

    let mut temp = Builder::new()
        .prefix(&format!(".{}.", filename))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| TiplineError::Storage(format!("Temp file create failed: {}", e)))?;
    temp.write_all(data)
        .map_err(|e| TiplineError::Storage(format!("Temp file write failed: {}", e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| TiplineError::Storage(format!("Temp file sync failed: {}", e)))?;

    temp.persist(path)
        .map_err(|e| TiplineError::Storage(format!("Atomic rename failed: {}", e.error)))?;
    Ok(())
}
