// SPDX-License-Identifier: Apache-2.0

//! Configuration for the file receiver.

use std::path::PathBuf;
use std::time::Duration;

use crate::receivers::file::error::{Error, Result};

/// Bytes requested from the source on every physical read
pub const DEFAULT_BUF_SIZE: usize = 16 * 1024;

/// Ceiling for a buffered, unterminated line before it is force-emitted
pub const DEFAULT_MAX_LINE_LENGTH: usize = 128 * 1024;

/// Number of checkpoint updates between implicit flushes
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 32;

/// On-disk encoding of the lines in a tailed file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text, one record per line
    #[default]
    Text,
    /// Docker json-file driver, one JSON object per line
    DockerJson,
    /// CRI tagged text: `<time> <stream> <tag> <content>`
    Cri,
}

/// Configuration for a single line reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Bytes per physical read
    pub buf_size: usize,
    /// Maximum bytes held for an unterminated line
    pub max_line_length: usize,
    /// Discard the unterminated tail of each read instead of carrying it over
    pub disable_previous_block: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buf_size: DEFAULT_BUF_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            disable_previous_block: false,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buf_size == 0 {
            return Err(Error::Config("buf_size must be > 0".to_string()));
        }
        if self.max_line_length == 0 {
            return Err(Error::Config("max_line_length must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Configuration for tailing one file
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// Logical source name recorded with every checkpoint and record
    pub source: String,
    /// Line encoding of the file
    pub format: LogFormat,
    /// Line reader settings
    pub reader: ReaderConfig,
    /// Start at the beginning when no checkpoint exists
    pub from_beginning: bool,
    /// Files smaller than this are read from the beginning when no checkpoint exists
    pub file_size_threshold: u64,
    /// Sleep between reads when the file has nothing new
    pub poll_interval: Duration,
    /// Interval between rotation/removal checks
    pub check_interval: Duration,
    /// Stop tailing a file not modified for this long
    pub ignore_dead_log: Option<Duration>,
    /// Maximum log records per batch sent downstream
    pub max_batch_size: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            source: "default".to_string(),
            format: LogFormat::Text,
            reader: ReaderConfig::default(),
            from_beginning: false,
            file_size_threshold: 20 * 1024 * 1024,
            poll_interval: Duration::from_secs(1),
            check_interval: Duration::from_secs(3),
            ignore_dead_log: None,
            max_batch_size: 128,
        }
    }
}

impl TailerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Err(Error::Config("source cannot be empty".to_string()));
        }
        if self.max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be > 0".to_string()));
        }
        self.reader.validate()
    }
}

/// Configuration for the checkpoint store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Backing file for persisted offsets
    pub path: PathBuf,
    /// Updates between implicit flushes
    pub flush_threshold: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/logtail/checkpoint.json"),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl CheckpointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(Error::Config("flush_threshold must be > 0".to_string()));
        }
        if self.path.as_os_str().is_empty() {
            return Err(Error::Config("checkpoint path cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ReaderConfig::default().validate().is_ok());
        assert!(TailerConfig::default().validate().is_ok());
        assert!(CheckpointConfig::default().validate().is_ok());
    }

    #[test]
    fn test_reader_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.buf_size, 16384);
        assert_eq!(config.max_line_length, 131072);
        assert!(!config.disable_previous_block);
    }

    #[test]
    fn test_empty_source_rejected() {
        let config = TailerConfig {
            source: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source cannot be empty"));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let reader = ReaderConfig {
            buf_size: 0,
            ..Default::default()
        };
        assert!(reader.validate().is_err());

        let checkpoint = CheckpointConfig {
            flush_threshold: 0,
            ..Default::default()
        };
        assert!(checkpoint.validate().is_err());
    }
}
