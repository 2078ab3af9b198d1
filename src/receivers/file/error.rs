// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A read returned zero bytes. Callers retry later, this is not a failure.
    #[error("read empty")]
    ReadEmpty,

    #[error("malformed log line: {0}")]
    MalformedLine(String),

    #[error("unknown log stream: {0:?}")]
    UnknownStream(String),

    #[error("checkpoint store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("checkpoint store closed")]
    StoreClosed,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error")]
    ChannelSend,
}

impl Error {
    /// True for the transient "nothing new to read" condition.
    pub fn is_read_empty(&self) -> bool {
        matches!(self, Error::ReadEmpty)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
