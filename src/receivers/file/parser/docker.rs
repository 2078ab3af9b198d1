// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use serde::Deserialize;

use super::traits::{LogMessage, Stream};
use crate::receivers::file::error::{Error, Result};

/// One line written by the Docker json-file logging driver.
#[derive(Debug, Deserialize)]
struct DockerLogLine {
    #[serde(default)]
    log: String,
    #[serde(default)]
    stream: String,
    /// Kept as the raw string, it is not decoded into a timestamp.
    #[serde(default)]
    #[allow(dead_code)]
    time: String,
}

/// Docker json-file: `{"log":"...","stream":"stdout","time":"..."}`.
///
/// A `log` value that does not end in a newline is a partial record the
/// driver split at its buffer limit.
pub fn parse_docker_json_log(line: &[u8]) -> Result<LogMessage<'static>> {
    let parsed: DockerLogLine = serde_json::from_slice(line)
        .map_err(|e| Error::MalformedLine(format!("invalid docker json log: {}", e)))?;

    let stream = Stream::from_bytes(parsed.stream.as_bytes())?;

    let mut msg = LogMessage {
        stream,
        ..Default::default()
    };

    if !parsed.log.is_empty() {
        msg.is_partial = !parsed.log.ends_with('\n');
        msg.log = Some(Cow::Owned(parsed.log.into_bytes()));
    }

    Ok(msg)
}
