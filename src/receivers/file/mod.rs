// SPDX-License-Identifier: Apache-2.0

//! File receiver for tailing log files.
//!
//! Each tailed file gets a [`Tailer`] that reads appended bytes in chunks,
//! decodes lines as plain text, Docker JSON or CRI, and converts them to OTLP
//! log records. Read positions are kept in a shared [`CheckpointStore`] so a
//! restart resumes where the previous run stopped.
//!
//! Features:
//! - Inode-keyed checkpoints that survive renames and rotations
//! - Reassembly of partial container log records
//! - Atomic checkpoint file writes

pub mod config;
pub mod convert;
pub mod error;
pub mod input;
pub mod parser;
pub mod persistence;
pub mod tailer;

pub use config::{CheckpointConfig, LogFormat, ReaderConfig, TailerConfig};
pub use error::{Error, Result};
pub use input::{FileId, LineReader, file_key, key_path, split_lines};
pub use parser::{LogMessage, Parser, Stream};
pub use persistence::{CheckpointEntry, CheckpointStore, CheckpointStoreCell, SharedCheckpointStore};
pub use tailer::{FileStatus, LogRecordBatch, Tailer, open_tailers};
