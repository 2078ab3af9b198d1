// SPDX-License-Identifier: Apache-2.0

//! Checkpoint store shared by every tailer.
//!
//! The store keeps `key -> {source, offset}` in memory and mirrors it to a
//! JSON file. Updates are counted and every `flush_threshold`-th update
//! rewrites the file, so after a crash a file is re-read from at most
//! `flush_threshold - 1` updates behind its last recorded position.
//!
//! All access goes through one mutex; a flush holds it while writing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{debug, info, warn};

use super::json_file::{atomic_write, ensure_parent_dir, load_state};
use super::schema::{CheckpointEntry, PersistedState};
use crate::receivers::file::config::CheckpointConfig;
use crate::receivers::file::error::{Error, Result};
use crate::receivers::file::input::key_path;

/// Shared handle to the checkpoint store
pub type SharedCheckpointStore = Arc<CheckpointStore>;

struct StoreInner {
    history: HashMap<String, CheckpointEntry>,
    /// Updates since the last flush
    writes: u64,
    closed: bool,
}

enum StoreState {
    Ready(Mutex<StoreInner>),
    /// Construction failed; every operation reports the recorded reason
    Unavailable(String),
}

/// Durable map from file key to read position
pub struct CheckpointStore {
    path: PathBuf,
    flush_threshold: u64,
    state: StoreState,
}

impl CheckpointStore {
    /// Open the store backed by `config.path`.
    ///
    /// A missing or undecodable file starts an empty store. Failing to
    /// prepare the backing location yields an unavailable store rather than
    /// an error, so tailing can go on without checkpoints.
    pub fn open(config: &CheckpointConfig) -> Self {
        let state = match Self::load(config) {
            Ok(history) => StoreState::Ready(Mutex::new(StoreInner {
                history,
                writes: 0,
                closed: false,
            })),
            Err(e) => {
                warn!(
                    path = ?config.path,
                    error = %e,
                    "Checkpoint store unavailable, tailing continues without checkpoints"
                );
                StoreState::Unavailable(e.to_string())
            }
        };

        let store = Self {
            path: config.path.clone(),
            flush_threshold: config.flush_threshold.max(1),
            state,
        };

        if let Ok(removed) = store.clean() {
            info!(
                path = ?store.path,
                entries = store.len(),
                removed,
                "Checkpoint store loaded"
            );
        }

        store
    }

    fn load(config: &CheckpointConfig) -> Result<HashMap<String, CheckpointEntry>> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(Error::Persistence(format!(
                    "checkpoint parent {:?} is not a directory",
                    parent
                )));
            }
        }

        if config.path.is_dir() {
            return Err(Error::Persistence(format!(
                "checkpoint path {:?} is a directory",
                config.path
            )));
        }

        match load_state(&config.path) {
            Ok(Some(state)) => Ok(state.history),
            Ok(None) => {
                debug!(path = ?config.path, "No checkpoint file, starting empty");
                Ok(HashMap::new())
            }
            Err(Error::Json(e)) => {
                warn!(path = ?config.path, error = %e, "Checkpoint file is corrupted, starting empty");
                Ok(HashMap::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False when construction failed and every operation is inert
    pub fn is_available(&self) -> bool {
        matches!(self.state, StoreState::Ready(_))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        match &self.state {
            StoreState::Ready(inner) => inner
                .lock()
                .map_err(|e| Error::Persistence(format!("checkpoint store lock poisoned: {}", e))),
            StoreState::Unavailable(reason) => Err(Error::StoreUnavailable(reason.clone())),
        }
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, StoreInner>> {
        let inner = self.lock()?;
        if inner.closed {
            return Err(Error::StoreClosed);
        }
        Ok(inner)
    }

    /// Record the position for `key`, flushing once the update count reaches
    /// the threshold.
    pub fn set(&self, key: &str, entry: CheckpointEntry) -> Result<()> {
        let mut inner = self.lock_open()?;
        inner.history.insert(key.to_string(), entry);
        inner.writes += 1;

        if inner.writes >= self.flush_threshold {
            self.flush_locked(&mut inner)?;
        }
        Ok(())
    }

    /// Record the position for `key` and write the file immediately.
    pub fn set_and_flush(&self, key: &str, entry: CheckpointEntry) -> Result<()> {
        let mut inner = self.lock_open()?;
        inner.history.insert(key.to_string(), entry);
        self.flush_locked(&mut inner)
    }

    /// Look up the position for `key`. `Ok(None)` when it was never set.
    pub fn get(&self, key: &str) -> Result<Option<CheckpointEntry>> {
        let inner = self.lock()?;
        Ok(inner.history.get(key).cloned())
    }

    /// Drop the entry for a file that has disappeared.
    pub fn remove(&self, key: &str) -> Result<Option<CheckpointEntry>> {
        let mut inner = self.lock_open()?;
        let removed = inner.history.remove(key);
        if removed.is_some() {
            inner.writes += 1;
            if inner.writes >= self.flush_threshold {
                self.flush_locked(&mut inner)?;
            }
        }
        Ok(removed)
    }

    /// Write the whole map to the backing file.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock()?;
        self.flush_locked(&mut inner)
    }

    fn flush_locked(&self, inner: &mut StoreInner) -> Result<()> {
        // Reset even on failure so a broken disk is not retried on every update
        inner.writes = 0;

        let state = PersistedState {
            history: inner.history.clone(),
        };
        atomic_write(&self.path, &state)?;

        debug!(
            path = ?self.path,
            entries = state.history.len(),
            "Checkpoint flushed"
        );
        Ok(())
    }

    /// Remove entries whose file path no longer exists. Returns how many were removed.
    pub fn clean(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.history.len();

        inner.history.retain(|key, _| {
            let keep = Path::new(key_path(key)).exists();
            if !keep {
                debug!(key = %key, "Removing checkpoint for missing file");
            }
            keep
        });

        Ok(before - inner.history.len())
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.history.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush a final time and refuse further updates.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        let result = self.flush_locked(&mut inner);

        info!(path = ?self.path, entries = inner.history.len(), "Checkpoint store closed");
        result
    }
}

/// Holds the process's single checkpoint store, opening it on first request.
///
/// Every call site that asks for the store gets the same instance, whatever
/// configuration it passes afterwards.
#[derive(Default)]
pub struct CheckpointStoreCell {
    store: OnceLock<SharedCheckpointStore>,
}

impl CheckpointStoreCell {
    pub const fn new() -> Self {
        Self {
            store: OnceLock::new(),
        }
    }

    pub fn get_or_open(&self, config: &CheckpointConfig) -> SharedCheckpointStore {
        self.store
            .get_or_init(|| Arc::new(CheckpointStore::open(config)))
            .clone()
    }

    pub fn get(&self) -> Option<SharedCheckpointStore> {
        self.store.get().cloned()
    }
}
