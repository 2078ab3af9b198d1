// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use super::traits::{LogMessage, Stream};
use crate::receivers::file::error::Result;

/// Plain text: every line is a complete stdout record, taken verbatim.
pub fn parse_file_text(line: &[u8]) -> Result<LogMessage<'_>> {
    Ok(LogMessage {
        stream: Stream::Stdout,
        log: Some(Cow::Borrowed(line)),
        is_partial: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_text() {
        let msg = parse_file_text(b"2024-04-20 ERROR something broke").unwrap();
        assert_eq!(msg.stream, Stream::Stdout);
        assert_eq!(msg.content(), b"2024-04-20 ERROR something broke");
        assert!(!msg.is_partial);
    }

    #[test]
    fn test_parse_file_text_empty() {
        let msg = parse_file_text(b"").unwrap();
        assert_eq!(msg.log.as_deref(), Some(&b""[..]));
        assert!(!msg.is_partial);
    }
}
