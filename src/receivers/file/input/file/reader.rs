// SPDX-License-Identifier: Apache-2.0

//! Incremental line reader.
//!
//! Every call performs exactly one read of up to `buf_size` bytes and returns
//! only newline-terminated content. Bytes after the last newline are kept in
//! `previous_block` and prepended to the next read, so a record split across
//! read boundaries comes out whole.

use std::io::{self, Read};

use crate::receivers::file::config::ReaderConfig;
use crate::receivers::file::error::{Error, Result};

const NEWLINE: u8 = b'\n';

/// LineReader turns fixed-size reads from a byte source into complete lines
pub struct LineReader<R> {
    /// Underlying byte source
    inner: R,
    /// Scratch buffer, `buf_size` bytes
    buf: Vec<u8>,
    /// Maximum size of the carried-over tail before it is force-emitted
    max_line_length: usize,
    /// Bytes read but not yet terminated by a newline
    previous_block: Vec<u8>,
    /// When set, the tail of each read is never carried over
    disable_previous_block: bool,
}

impl<R: Read> LineReader<R> {
    /// Create a reader with default settings
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a reader with the given settings
    pub fn with_config(inner: R, config: ReaderConfig) -> Self {
        Self {
            inner,
            buf: vec![0; config.buf_size.max(1)],
            max_line_length: config.max_line_length,
            previous_block: Vec::new(),
            disable_previous_block: config.disable_previous_block,
        }
    }

    /// Point the reader at a new source that continues the same stream.
    ///
    /// The buffered tail is kept, so a record split across a reopen of the
    /// same file is not lost.
    pub fn set_reader(&mut self, inner: R) {
        self.inner = inner;
    }

    /// Point the reader at a source that is a different file.
    ///
    /// The buffered tail belongs to the old file and is handed back instead
    /// of being joined with bytes from the new one.
    pub fn reset_reader(&mut self, inner: R) -> Vec<u8> {
        self.inner = inner;
        std::mem::take(&mut self.previous_block)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Bytes currently held back waiting for a newline
    pub fn previous_block(&self) -> &[u8] {
        &self.previous_block
    }

    /// Read once and return the complete lines, without their newlines.
    ///
    /// Returns the lines and the number of bytes consumed from the source.
    pub fn read_lines(&mut self) -> Result<(Vec<Vec<u8>>, usize)> {
        let n = self.read_chunk()?;
        let chunk = &self.buf[..n];

        let mut segments: Vec<&[u8]> = chunk.split(|b| *b == NEWLINE).collect();
        let mut lines = Vec::with_capacity(segments.len());

        // split always yields at least one segment
        let last = if self.disable_previous_block {
            None
        } else {
            segments.pop()
        };

        for (i, segment) in segments.into_iter().enumerate() {
            if i == 0 && !self.previous_block.is_empty() {
                let mut line = std::mem::take(&mut self.previous_block);
                line.extend_from_slice(segment);
                lines.push(line);
            } else if self.disable_previous_block && segment.is_empty() {
                continue;
            } else {
                lines.push(segment.to_vec());
            }
        }

        if let Some(tail) = last {
            // The tail continues whatever is still buffered when this chunk
            // held no newline at all.
            self.previous_block.extend_from_slice(tail);
        }

        if self.previous_block.len() > self.max_line_length {
            lines.push(std::mem::take(&mut self.previous_block));
        }

        Ok((lines, n))
    }

    /// Read once and return a single block of complete content.
    ///
    /// The block runs from the buffered tail through the last newline of the
    /// new chunk, newlines included. It is empty when the chunk completed no
    /// line. Use [`split_lines`] to break it up.
    pub fn read_line_block(&mut self) -> Result<(Vec<u8>, usize)> {
        let n = self.read_chunk()?;
        let chunk = &self.buf[..n];

        let mut block = Vec::new();

        if self.disable_previous_block {
            block.extend_from_slice(chunk);
            return Ok((block, n));
        }

        match memrchr(NEWLINE, chunk) {
            Some(pos) => {
                block = std::mem::take(&mut self.previous_block);
                block.extend_from_slice(&chunk[..=pos]);
                self.previous_block.extend_from_slice(&chunk[pos + 1..]);
            }
            None => self.previous_block.extend_from_slice(chunk),
        }

        if self.previous_block.len() > self.max_line_length {
            block.append(&mut self.previous_block);
        }

        Ok((block, n))
    }

    fn read_chunk(&mut self) -> Result<usize> {
        let n = loop {
            match self.inner.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        };

        if n == 0 {
            return Err(Error::ReadEmpty);
        }
        Ok(n)
    }
}

/// Split a block into its non-empty lines, dropping newlines and a trailing `\r`.
///
/// Each line is paired with the position where it starts within the block.
pub fn split_lines(block: &[u8]) -> Vec<(usize, &[u8])> {
    let mut lines = Vec::new();
    let mut start = 0;
    for line in block.split(|b| *b == NEWLINE) {
        let begin = start;
        start += line.len() + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if !line.is_empty() {
            lines.push((begin, line));
        }
    }
    lines
}

fn memrchr(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().rposition(|b| *b == needle)
}
