// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use super::traits::{LogMessage, Stream};
use crate::receivers::file::error::{Error, Result};

const DELIMITER: u8 = b' ';
const TAG_DELIMITER: u8 = b':';
const PARTIAL_TAG: &[u8] = b"P";

/// CRI tagged text: `<timestamp> <stream> <tag>[:<tag>...] <content>`.
///
/// The timestamp is left undecoded. A line that ends right after the stream
/// or the tag carries no content and yields `log: None`; a tag followed by a
/// single space yields an empty, but set, content. Partial fragments lose one
/// trailing newline so they can be concatenated.
pub fn parse_cri_log(line: &[u8]) -> Result<LogMessage<'_>> {
    let (_timestamp, rest) = split_field(line)
        .ok_or_else(|| Error::MalformedLine("cri log: timestamp is not found".to_string()))?;

    let (stream, rest) = split_field(rest)
        .ok_or_else(|| Error::MalformedLine("cri log: stream type is not found".to_string()))?;

    let mut msg = LogMessage {
        stream: Stream::from_bytes(stream)?,
        ..Default::default()
    };

    let Some((tags, content)) = split_field(rest) else {
        return Ok(msg);
    };

    msg.is_partial = tags
        .split(|b| *b == TAG_DELIMITER)
        .next()
        .is_some_and(|tag| tag == PARTIAL_TAG);

    let content = if msg.is_partial {
        content.strip_suffix(b"\n").unwrap_or(content)
    } else {
        content
    };
    msg.log = Some(Cow::Borrowed(content));

    Ok(msg)
}

fn split_field(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = data.iter().position(|b| *b == DELIMITER)?;
    Some((&data[..idx], &data[idx + 1..]))
}
