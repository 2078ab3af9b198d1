// SPDX-License-Identifier: Apache-2.0

//! Container log format parsing.
//!
//! This module turns raw lines into [`LogMessage`] values.
//!
//! # Available Formats
//!
//! - [`parse_file_text`] - plain text, every line a full stdout record
//! - [`parse_docker_json_log`] - Docker json-file driver output
//! - [`parse_cri_log`] - CRI tagged text written by containerd and CRI-O
//!
//! The format is chosen once per tailed file through [`LogFormat`].

mod cri;
mod docker;
mod text;
mod traits;

pub use cri::parse_cri_log;
pub use docker::parse_docker_json_log;
pub use text::parse_file_text;
pub use traits::{LogMessage, Parser, Stream};

use crate::receivers::file::config::LogFormat;
use crate::receivers::file::error::Result;

impl Parser for LogFormat {
    fn parse<'a>(&self, line: &'a [u8]) -> Result<LogMessage<'a>> {
        match self {
            LogFormat::Text => parse_file_text(line),
            LogFormat::DockerJson => parse_docker_json_log(line),
            LogFormat::Cri => parse_cri_log(line),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::DockerJson => "docker_json",
            LogFormat::Cri => "cri",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_format() {
        let cri = b"2024-04-20T18:39:20.57606443Z stderr P chunk";
        let msg = LogFormat::Cri.parse(cri).unwrap();
        assert_eq!(msg.stream, Stream::Stderr);
        assert!(msg.is_partial);

        let msg = LogFormat::Text.parse(cri).unwrap();
        assert_eq!(msg.content(), cri);
        assert!(!msg.is_partial);

        assert!(LogFormat::DockerJson.parse(cri).is_err());
    }
}
