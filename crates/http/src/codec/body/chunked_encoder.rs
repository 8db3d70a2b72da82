use crate::codec::line_buffer::put_hex;
use crate::protocol::{ConnectionError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

const CRLF: &[u8] = b"\r\n";
const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Frames each chunk as `<hex size>\r\n<data>\r\n`, closing the stream with `0\r\n\r\n`.
///
/// Empty chunks are skipped: written out they would read as the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = ConnectionError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut bytes) => {
                let len = bytes.remaining();
                if len == 0 {
                    return Ok(());
                }
                dst.reserve(len + 20);
                put_hex(dst, len as u64);
                dst.extend_from_slice(CRLF);
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(n);
                }
                dst.extend_from_slice(CRLF);
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(LAST_CHUNK);
                Ok(())
            }
        }
    }
}
