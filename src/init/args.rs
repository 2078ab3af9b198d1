// SPDX-License-Identifier: Apache-2.0

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::receivers::file::config::{
    CheckpointConfig, DEFAULT_BUF_SIZE, DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_LINE_LENGTH, LogFormat,
    ReaderConfig, TailerConfig,
};

/// Line format of the tailed files
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    /// Plain text, one record per line
    #[default]
    Text,
    /// Docker json-file driver output
    DockerJson,
    /// CRI container runtime output
    Cri,
}

impl From<FormatArg> for LogFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Text => LogFormat::Text,
            FormatArg::DockerJson => LogFormat::DockerJson,
            FormatArg::Cri => LogFormat::Cri,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct TailArgs {
    /// Comma-separated list of files to tail
    #[arg(long, env = "LOGTAIL_PATH", value_delimiter = ',', required = true)]
    pub path: Vec<PathBuf>,

    /// Line format: text, docker-json, cri
    #[arg(value_enum, long, env = "LOGTAIL_FORMAT", default_value = "text")]
    pub format: FormatArg,

    /// Source name attached to records and checkpoints
    #[arg(long, env = "LOGTAIL_SOURCE", default_value = "default")]
    pub source: String,

    /// Path of the checkpoint file
    #[arg(
        long,
        env = "LOGTAIL_CHECKPOINT_PATH",
        default_value = "/var/lib/logtail/checkpoint.json"
    )]
    pub checkpoint_path: PathBuf,

    /// Checkpoint updates between writes of the checkpoint file
    #[arg(long, env = "LOGTAIL_CHECKPOINT_FLUSH_THRESHOLD", default_value_t = DEFAULT_FLUSH_THRESHOLD)]
    pub checkpoint_flush_threshold: u64,

    /// Read files without a checkpoint from the beginning
    #[arg(long, env = "LOGTAIL_FROM_BEGINNING", default_value = "false")]
    pub from_beginning: bool,

    /// Files without a checkpoint smaller than this many bytes are read from the beginning
    #[arg(
        long,
        env = "LOGTAIL_FILE_SIZE_THRESHOLD",
        default_value = "20971520"
    )]
    pub file_size_threshold: u64,

    /// Bytes per read
    #[arg(long, env = "LOGTAIL_BUF_SIZE", default_value_t = DEFAULT_BUF_SIZE)]
    pub buf_size: usize,

    /// Maximum bytes held for an unterminated line before it is emitted
    #[arg(long, env = "LOGTAIL_MAX_LINE_LENGTH", default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,

    /// Poll interval in milliseconds when a file has no new data
    #[arg(long, env = "LOGTAIL_POLL_INTERVAL_MS", default_value = "1000")]
    pub poll_interval_ms: u64,

    /// Interval in milliseconds between rotation checks
    #[arg(long, env = "LOGTAIL_CHECK_INTERVAL_MS", default_value = "3000")]
    pub check_interval_ms: u64,

    /// Stop tailing files not modified for this many seconds
    #[arg(long, env = "LOGTAIL_IGNORE_DEAD_LOG_SECS")]
    pub ignore_dead_log_secs: Option<u64>,

    /// Maximum log records per batch
    #[arg(long, env = "LOGTAIL_MAX_BATCH_SIZE", default_value = "128")]
    pub max_batch_size: usize,
}

impl TailArgs {
    pub fn tailer_config(&self) -> TailerConfig {
        TailerConfig {
            source: self.source.clone(),
            format: self.format.into(),
            reader: ReaderConfig {
                buf_size: self.buf_size,
                max_line_length: self.max_line_length,
                disable_previous_block: false,
            },
            from_beginning: self.from_beginning,
            file_size_threshold: self.file_size_threshold,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            check_interval: Duration::from_millis(self.check_interval_ms),
            ignore_dead_log: self.ignore_dead_log_secs.map(Duration::from_secs),
            max_batch_size: self.max_batch_size,
        }
    }

    pub fn checkpoint_config(&self) -> CheckpointConfig {
        CheckpointConfig {
            path: self.checkpoint_path.clone(),
            flush_threshold: self.checkpoint_flush_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        tail: TailArgs,
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = TestCli::parse_from(["test", "--path", "/var/log/app.log"]);
        let config = cli.tail.tailer_config();
        let defaults = TailerConfig::default();

        assert_eq!(config.source, defaults.source);
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.reader, defaults.reader);
        assert_eq!(config.file_size_threshold, defaults.file_size_threshold);
        assert_eq!(config.poll_interval, defaults.poll_interval);
        assert_eq!(config.check_interval, defaults.check_interval);
        assert_eq!(config.ignore_dead_log, None);
        assert_eq!(config.max_batch_size, defaults.max_batch_size);
        assert_eq!(cli.tail.checkpoint_config(), CheckpointConfig::default());
    }

    #[test]
    fn test_multiple_paths_and_format() {
        let cli = TestCli::parse_from([
            "test",
            "--path",
            "/var/log/a.log,/var/log/b.log",
            "--format",
            "docker-json",
            "--ignore-dead-log-secs",
            "60",
        ]);

        assert_eq!(
            cli.tail.path,
            vec![PathBuf::from("/var/log/a.log"), PathBuf::from("/var/log/b.log")]
        );
        let config = cli.tail.tailer_config();
        assert_eq!(config.format, LogFormat::DockerJson);
        assert_eq!(config.ignore_dead_log, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_path_required() {
        assert!(TestCli::try_parse_from(["test"]).is_err());
    }
}
