//! Decoder for `Transfer-Encoding: chunked` request bodies.
//!
//! Chunk extensions and trailer fields are accepted and ignored.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

/// Longest size line accepted, extensions included
const MAX_SIZE_LINE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// waiting for a `<hex size>[;ext]\r\n` line
    Size,
    /// `remaining` bytes of chunk data left
    Data { remaining: u64 },
    /// the CRLF closing a chunk's data
    DataEnd,
    /// trailer lines until the empty one
    Trailer,
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }

                State::Size => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    let size = parse_size(&line)?;
                    self.state = if size == 0 { State::Trailer } else { State::Data { remaining: size } };
                }

                State::Data { remaining } => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let len = remaining.min(src.len() as u64);
                    let bytes = src.split_to(len as usize).freeze();
                    let remaining = remaining - len;
                    self.state = if remaining == 0 { State::DataEnd } else { State::Data { remaining } };
                    trace!(len = bytes.len(), "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                State::DataEnd => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(ParseError::invalid_body("chunk data not followed by CRLF"));
                    }
                    src.advance(2);
                    self.state = State::Size;
                }

                State::Trailer => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.state = State::End;
                    }
                }
            }
        }
    }
}

/// Splits off one CRLF-terminated line, without the terminator.
fn take_line(src: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
    let Some(end) = src.windows(2).position(|window| window == b"\r\n") else {
        if src.len() > MAX_SIZE_LINE {
            return Err(ParseError::invalid_body("chunk size line too long"));
        }
        return Ok(None);
    };
    if end > MAX_SIZE_LINE {
        return Err(ParseError::invalid_body("chunk size line too long"));
    }
    let line = src.split_to(end);
    src.advance(2);
    Ok(Some(line))
}

fn parse_size(line: &[u8]) -> Result<u64, ParseError> {
    let size_part = match line.iter().position(|b| *b == b';') {
        Some(index) => &line[..index],
        None => line,
    };
    let digits = size_part.trim_ascii();
    if digits.is_empty() {
        return Err(ParseError::invalid_body("missing chunk size"));
    }

    digits.iter().try_fold(0u64, |size, b| {
        let digit = (*b as char).to_digit(16).ok_or_else(|| ParseError::invalid_body("invalid chunk size"))?;
        size.checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))
    })
}
