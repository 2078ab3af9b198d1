// SPDX-License-Identifier: Apache-2.0

//! Tailing worker for a single file.
//!
//! A [`Tailer`] owns the open file and its [`LineReader`], decodes each line
//! with the file's [`LogFormat`], joins partial container records, forwards
//! the results as OTLP log records and records its position in the shared
//! checkpoint store after every chunk.
//!
//! The recorded position never runs ahead of forwarded data: bytes still held
//! by the reader and fragments of an unfinished partial record are excluded,
//! so a restart re-reads them instead of skipping them.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use opentelemetry_proto::tonic::common::v1::KeyValue as OtlpKeyValue;
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::receivers::file::config::TailerConfig;
use crate::receivers::file::convert::{
    build_log_record, file_attributes, now_unix_nanos, spread_log_times,
};
use crate::receivers::file::error::{Error, Result};
use crate::receivers::file::input::{FileId, LineReader, absolute_path, key_for, split_lines};
use crate::receivers::file::parser::{Parser, Stream};
use crate::receivers::file::persistence::{CheckpointEntry, SharedCheckpointStore};
use crate::receivers::get_meter;

/// Consecutive read failures tolerated before the tailer gives up
const MAX_READ_FAILURES: u32 = 3;

/// Longest single sleep, so cancellation is noticed promptly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Log records read from one file in one chunk
#[derive(Debug)]
pub struct LogRecordBatch {
    /// Path of the file the records came from
    pub path: PathBuf,
    /// Logical source name
    pub source: String,
    pub log_records: Vec<LogRecord>,
}

/// Outcome of a rotation/removal check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Same file, keep reading
    Active,
    /// A different file now lives at the path; the tailer switched to it
    Rotated,
    /// The file is gone
    Removed,
    /// The file was not modified for longer than `ignore_dead_log`
    Inactive,
}

/// Tails one file
pub struct Tailer {
    config: TailerConfig,
    path: PathBuf,
    file_id: Option<FileId>,
    key: String,
    reader: LineReader<File>,
    /// Bytes consumed from the current file
    offset: u64,
    /// Content of an unfinished partial record
    partial: Vec<u8>,
    /// File position of the line that started `partial`
    partial_start: Option<u64>,
    partial_stream: Stream,
    store: SharedCheckpointStore,
    records_tx: flume::Sender<LogRecordBatch>,
    file_attributes: Vec<OtlpKeyValue>,
    parse_failures: Counter<u64>,
    rotations: Counter<u64>,
    forwarded: Counter<u64>,
    tags: [KeyValue; 1],
}

impl Tailer {
    /// Open `path` and position it from the checkpoint store or the start policy.
    pub fn open(
        path: impl AsRef<Path>,
        config: TailerConfig,
        store: SharedCheckpointStore,
        records_tx: flume::Sender<LogRecordBatch>,
    ) -> Result<Self> {
        config.validate()?;

        let path = absolute_path(path)?;
        let file = File::open(&path)?;
        let file_id = FileId::from_file(&file)?;
        let key = key_for(&path, file_id);

        let meter = get_meter();
        let parse_failures = meter
            .u64_counter("logtail_parse_failures")
            .with_description("Number of lines that did not match the configured log format.")
            .with_unit("lines")
            .build();
        let rotations = meter
            .u64_counter("logtail_file_rotations")
            .with_description("Number of times a tailed file was rotated or truncated.")
            .build();
        let forwarded = meter
            .u64_counter("logtail_records_forwarded")
            .with_description("Number of log records sent downstream.")
            .with_unit("log_records")
            .build();
        let tags = [KeyValue::new("source", config.source.clone())];

        let file_attributes = file_attributes(&path, &config.source);
        let reader = LineReader::with_config(file, config.reader);

        let mut tailer = Self {
            config,
            path,
            file_id,
            key,
            reader,
            offset: 0,
            partial: Vec::new(),
            partial_start: None,
            partial_stream: Stream::Stdout,
            store,
            records_tx,
            file_attributes,
            parse_failures,
            rotations,
            forwarded,
            tags,
        };
        tailer.offset = tailer.seek_offset()?;

        debug!(
            path = ?tailer.path,
            key = %tailer.key,
            offset = tailer.offset,
            "File opened for tailing"
        );
        Ok(tailer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint key of the file currently being read
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bytes consumed from the current file
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Position that is safe to resume from: everything before it was forwarded.
    pub fn checkpoint_offset(&self) -> u64 {
        let buffered = self.reader.previous_block().len() as u64;
        let read_end = self.offset.saturating_sub(buffered);
        self.partial_start.map_or(read_end, |start| start.min(read_end))
    }

    fn seek_offset(&mut self) -> Result<u64> {
        let size = self.reader.get_ref().metadata()?.len();

        match self.store.get(&self.key) {
            Ok(Some(entry)) if entry.offset <= size => {
                let offset = self.reader.get_mut().seek(SeekFrom::Start(entry.offset))?;
                info!(path = ?self.path, offset, "Resuming from recorded position");
                return Ok(offset);
            }
            Ok(Some(entry)) => {
                info!(
                    path = ?self.path,
                    offset = entry.offset,
                    size,
                    "Recorded position beyond file size, file may have been truncated"
                );
            }
            Ok(None) => debug!(key = %self.key, "No recorded position"),
            Err(e) => debug!(key = %self.key, error = %e, "Recorded position unavailable"),
        }

        let offset = if self.config.from_beginning || size < self.config.file_size_threshold {
            self.reader.get_mut().seek(SeekFrom::Start(0))?
        } else {
            self.reader.get_mut().seek(SeekFrom::End(0))?
        };
        info!(path = ?self.path, offset, size, "Set start position");
        Ok(offset)
    }

    /// Read one chunk, forward the records it completes and record the position.
    ///
    /// Returns the number of bytes read. [`Error::ReadEmpty`] means there is
    /// nothing new yet.
    pub fn read_once(&mut self) -> Result<usize> {
        let (block, n) = self.reader.read_line_block()?;
        self.offset += n as u64;

        let block_end = self.offset - self.reader.previous_block().len() as u64;
        let block_start = block_end - block.len() as u64;

        let records = self.process(&block, block_start);
        self.feed(records)?;
        self.record_offset();

        debug!(path = ?self.path, bytes = n, offset = self.offset, "Read chunk");
        Ok(n)
    }

    fn process(&mut self, block: &[u8], block_start: u64) -> Vec<LogRecord> {
        let mut records = Vec::new();
        let now = now_unix_nanos();

        for (pos, line) in split_lines(block) {
            let msg = match self.config.format.parse(line) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(
                        path = ?self.path,
                        format = self.config.format.as_str(),
                        error = %e,
                        "Failed to parse log line, skipping"
                    );
                    self.parse_failures.add(1, &self.tags);
                    continue;
                }
            };

            if msg.is_partial {
                if self.partial_start.is_none() {
                    self.partial_start = Some(block_start + pos as u64);
                    self.partial_stream = msg.stream;
                }
                self.partial.extend_from_slice(msg.content());

                if self.partial.len() > self.config.reader.max_line_length {
                    let text = std::mem::take(&mut self.partial);
                    self.partial_start = None;
                    self.push_record(&mut records, &text, msg.stream, now);
                }
                continue;
            }

            if self.partial.is_empty() {
                self.push_record(&mut records, msg.content(), msg.stream, now);
            } else {
                let mut text = std::mem::take(&mut self.partial);
                text.extend_from_slice(msg.content());
                self.partial_start = None;
                self.push_record(&mut records, &text, msg.stream, now);
            }
        }

        spread_log_times(&mut records, now);
        records
    }

    fn push_record(&self, records: &mut Vec<LogRecord>, text: &[u8], stream: Stream, now: u64) {
        let text = text.trim_ascii_end();
        if text.is_empty() {
            return;
        }
        records.push(build_log_record(text, stream, &self.file_attributes, now));
    }

    fn feed(&self, mut records: Vec<LogRecord>) -> Result<()> {
        while !records.is_empty() {
            let rest = records.split_off(records.len().min(self.config.max_batch_size));
            let count = records.len() as u64;
            let batch = LogRecordBatch {
                path: self.path.clone(),
                source: self.config.source.clone(),
                log_records: records,
            };
            self.records_tx.send(batch).map_err(|_| Error::ChannelSend)?;
            self.forwarded.add(count, &self.tags);
            records = rest;
        }
        Ok(())
    }

    fn record_offset(&self) {
        let entry = CheckpointEntry::new(self.config.source.clone(), self.checkpoint_offset());
        if let Err(e) = self.store.set(&self.key, entry) {
            log_store_error(&self.key, &e);
        }
    }

    /// Record the current position and write the checkpoint file now.
    pub fn record_position(&self) {
        let offset = self.checkpoint_offset();
        if offset == 0 {
            return;
        }

        let entry = CheckpointEntry::new(self.config.source.clone(), offset);
        if let Err(e) = self.store.set_and_flush(&self.key, entry) {
            log_store_error(&self.key, &e);
        }
    }

    /// Check whether the file at the path was rotated, truncated or removed.
    ///
    /// On rotation the old handle is read to its end, then the tailer
    /// switches to the new file from its beginning.
    pub fn check_file(&mut self) -> Result<FileStatus> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = ?self.path, "File removed, reading to EOF");
                self.read_to_eof();
                let tail = self.reader.previous_block().to_vec();
                self.forward_pending(&tail)?;
                if let Err(e) = self.store.remove(&self.key) {
                    log_store_error(&self.key, &e);
                }
                return Ok(FileStatus::Removed);
            }
            Err(e) => return Err(e.into()),
        };

        let current_id = FileId::from_path(&self.path)?;
        let replaced = current_id != self.file_id;
        let truncated = metadata.len() < self.offset;

        if replaced || truncated {
            info!(
                path = ?self.path,
                offset = self.offset,
                size = metadata.len(),
                replaced,
                truncated,
                "File rotated, reading to EOF"
            );
            if replaced {
                self.read_to_eof();
            }
            self.reopen()?;
            return Ok(FileStatus::Rotated);
        }

        if let Some(max_idle) = self.config.ignore_dead_log {
            let idle = metadata
                .modified()
                .ok()
                .and_then(|m| SystemTime::now().duration_since(m).ok())
                .unwrap_or_default();
            if idle > max_idle {
                info!(path = ?self.path, idle = ?idle, "File inactive");
                return Ok(FileStatus::Inactive);
            }
        }

        Ok(FileStatus::Active)
    }

    fn read_to_eof(&mut self) {
        loop {
            match self.read_once() {
                Ok(_) => {}
                Err(e) => {
                    if !e.is_read_empty() {
                        warn!(path = ?self.path, error = %e, "Read to EOF failed");
                    }
                    return;
                }
            }
        }
    }

    /// Forward whatever is still buffered for the current file as one last record.
    fn forward_pending(&mut self, tail: &[u8]) -> Result<()> {
        let mut text = std::mem::take(&mut self.partial);
        self.partial_start = None;
        text.extend_from_slice(tail);

        let mut records = Vec::new();
        self.push_record(&mut records, &text, self.partial_stream, now_unix_nanos());
        self.feed(records)
    }

    fn reopen(&mut self) -> Result<()> {
        let file = File::open(&self.path)?;
        let file_id = FileId::from_file(&file)?;
        let old_key = std::mem::replace(&mut self.key, key_for(&self.path, file_id));

        // Anything buffered belongs to the old file
        let tail = self.reader.reset_reader(file);
        self.forward_pending(&tail)?;

        self.file_id = file_id;
        self.offset = self.reader.get_mut().seek(SeekFrom::Start(0))?;

        if old_key != self.key {
            if let Err(e) = self.store.remove(&old_key) {
                log_store_error(&old_key, &e);
            }
        }

        self.rotations.add(1, &self.tags);
        info!(path = ?self.path, key = %self.key, "Reopened file, offset reset to 0");
        Ok(())
    }

    /// Reopen the file at the path after read failures.
    ///
    /// The same file is reopened at the current offset and keeps its buffered
    /// tail. A different file is handled like a rotation.
    fn reopen_in_place(&mut self) -> Result<()> {
        let mut file = File::open(&self.path)?;
        if FileId::from_file(&file)? != self.file_id {
            return self.reopen();
        }

        file.seek(SeekFrom::Start(self.offset))?;
        self.reader.set_reader(file);
        info!(path = ?self.path, offset = self.offset, "Reopened file after read failures");
        Ok(())
    }

    /// Tail until cancelled, removed or inactive. Blocks the calling thread.
    pub fn run(mut self, cancel: &CancellationToken) -> Result<()> {
        info!(
            path = ?self.path,
            source = %self.config.source,
            format = self.config.format.as_str(),
            "Starting tailer"
        );

        let mut last_check = Instant::now();
        let mut failures = 0;
        let mut reopened = false;
        let mut removed = false;

        let result = loop {
            if cancel.is_cancelled() {
                debug!(path = ?self.path, "Tailer cancelled");
                break Ok(());
            }

            if last_check.elapsed() >= self.config.check_interval {
                last_check = Instant::now();
                match self.check_file() {
                    Ok(FileStatus::Removed) => {
                        removed = true;
                        break Ok(());
                    }
                    Ok(FileStatus::Inactive) => break Ok(()),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = ?self.path, error = %e, "File check failed");
                    }
                }
            }

            match self.read_once() {
                Ok(_) => {
                    failures = 0;
                    reopened = false;
                }
                Err(Error::ReadEmpty) => {
                    failures = 0;
                    sleep_unless_cancelled(self.config.poll_interval, cancel);
                }
                Err(Error::ChannelSend) => {
                    debug!(path = ?self.path, "Records channel closed, stopping tailer");
                    break Ok(());
                }
                Err(e) => {
                    failures += 1;
                    warn!(path = ?self.path, error = %e, failures, "Failed to read file");
                    if failures >= MAX_READ_FAILURES {
                        if reopened {
                            break Err(e);
                        }
                        reopened = true;
                        if let Err(reopen_err) = self.reopen_in_place() {
                            warn!(path = ?self.path, error = %reopen_err, "Failed to reopen file");
                            break Err(e);
                        }
                        failures = 0;
                    }
                    sleep_unless_cancelled(self.config.poll_interval, cancel);
                }
            }
        };

        if !removed {
            self.record_position();
        }
        info!(path = ?self.path, offset = self.offset, "Tailer stopped");
        result
    }

    /// Run on the blocking thread pool.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<()>> {
        tokio::task::spawn_blocking(move || self.run(&cancel))
    }
}

/// Open a tailer for every path. Paths that fail to open are logged and
/// skipped so they do not hold up the others.
pub fn open_tailers<P: AsRef<Path>>(
    paths: &[P],
    config: &TailerConfig,
    store: &SharedCheckpointStore,
    records_tx: &flume::Sender<LogRecordBatch>,
) -> Vec<Tailer> {
    paths
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            match Tailer::open(path, config.clone(), store.clone(), records_tx.clone()) {
                Ok(tailer) => Some(tailer),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to open file, skipping");
                    None
                }
            }
        })
        .collect()
}

fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

fn log_store_error(key: &str, e: &Error) {
    match e {
        // Already reported once when the store was opened
        Error::StoreUnavailable(_) | Error::StoreClosed => {
            debug!(key = %key, error = %e, "Checkpoint not recorded")
        }
        _ => warn!(key = %key, error = %e, "Failed to record checkpoint"),
    }
}
