// SPDX-License-Identifier: Apache-2.0

//! Persistence for read positions of tailed files.
//!
//! Uses JSON file storage with atomic writes for reliable offset tracking.

mod json_file;
mod schema;
mod store;

pub use json_file::{atomic_write, load_state};
pub use schema::{CheckpointEntry, PersistedState};
pub use store::{CheckpointStore, CheckpointStoreCell, SharedCheckpointStore};
