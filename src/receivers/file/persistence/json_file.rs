// SPDX-License-Identifier: Apache-2.0

//! JSON file backing for the checkpoint store.
//!
//! Writes are atomic using a write-to-temp-then-rename strategy, so a crash
//! mid-write leaves either the old or the new file, never a truncated one.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use super::schema::PersistedState;
use crate::receivers::file::error::{Error, Result};

/// Load persisted state. A missing file yields `Ok(None)`.
///
/// Decode failures come back as [`Error::Json`], I/O failures as [`Error::Io`].
pub fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };

    let state = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(state))
}

/// Write state to file atomically (write to temp, then rename)
pub fn atomic_write(path: &Path, state: &PersistedState) -> Result<()> {
    use portable_atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    ensure_parent_dir(path)?;

    // Unique per process and per write, so concurrent stores never share a temp file
    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let result = write_file(&temp_path, state).and_then(|()| {
        fs::rename(&temp_path, path)
            .map_err(|e| Error::Persistence(format!("failed to rename checkpoint file: {}", e)))
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Create the parent directory of `path` if it does not exist yet
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("failed to create checkpoint directory: {}", e))
            })?;
        }
    }
    Ok(())
}

fn write_file(temp_path: &Path, state: &PersistedState) -> Result<()> {
    let file = File::create(temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write checkpoint: {}", e)))?;

    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("failed to flush checkpoint: {}", e)))?;

    // Data must be on disk before the rename makes it visible
    let file = writer
        .into_inner()
        .map_err(|e| Error::Persistence(format!("failed to flush checkpoint: {}", e)))?;
    file.sync_all()
        .map_err(|e| Error::Persistence(format!("failed to sync checkpoint: {}", e)))?;

    Ok(())
}
