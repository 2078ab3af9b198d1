// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::receivers::file::error::{Error, Result};

/// Output stream a container wrote a record to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }

    /// Parse a raw stream field, which must be exactly `stdout` or `stderr`.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        match raw {
            b"stdout" => Ok(Stream::Stdout),
            b"stderr" => Ok(Stream::Stderr),
            other => Err(Error::UnknownStream(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

impl FromStr for Stream {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw line decoded from a container log encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogMessage<'a> {
    pub stream: Stream,
    /// Record content. `None` when the line carried nothing attributable,
    /// which is distinct from an empty slice.
    pub log: Option<Cow<'a, [u8]>>,
    /// The runtime has not terminated this record yet; the content of the
    /// following line(s) must be appended to it.
    pub is_partial: bool,
}

impl<'a> LogMessage<'a> {
    /// Content bytes, empty when unset.
    pub fn content(&self) -> &[u8] {
        self.log.as_deref().unwrap_or_default()
    }
}

/// Parser decodes one raw line, as produced by the line reader, into a
/// [`LogMessage`]. Implementations are stateless; partial reassembly is up
/// to the caller.
pub trait Parser: Send + Sync {
    fn parse<'a>(&self, line: &'a [u8]) -> Result<LogMessage<'a>>;
}
