use crate::protocol::{ConnectionError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// Writes body bytes as they are.
///
/// With a declared length, bytes beyond it are dropped so the peer never sees more than the
/// `Content-Length` header announced. Without one, the body runs until the connection closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: Option<u64>,
}

impl LengthEncoder {
    pub fn new(length: Option<u64>) -> Self {
        Self { remaining: length }
    }

    /// Bytes still owed to the peer, if a length was declared.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    pub fn is_finish(&self) -> bool {
        self.remaining == Some(0)
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = ConnectionError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let PayloadItem::Chunk(mut bytes) = item else {
            return Ok(());
        };

        let Some(remaining) = self.remaining.as_mut() else {
            while bytes.has_remaining() {
                let chunk = bytes.chunk();
                dst.extend_from_slice(chunk);
                let len = chunk.len();
                bytes.advance(len);
            }
            return Ok(());
        };

        let len = bytes.remaining() as u64;
        if len > *remaining {
            warn!(len, remaining = *remaining, "body exceeds declared content-length, dropping excess bytes");
        }

        let mut take = len.min(*remaining) as usize;
        *remaining -= take as u64;
        dst.reserve(take);
        while take > 0 {
            let chunk = bytes.chunk();
            let n = chunk.len().min(take);
            dst.extend_from_slice(&chunk[..n]);
            bytes.advance(n);
            take -= n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn writes_up_to_declared_length() {
        let mut encoder = LengthEncoder::new(Some(5));
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst).unwrap();
        assert_eq!(encoder.remaining(), Some(2));
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"defgh")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"abcde");
        assert!(encoder.is_finish());
    }

    #[test]
    fn unbounded_without_length() {
        let mut encoder = LengthEncoder::new(None);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello ")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"world")), &mut dst).unwrap();

        assert_eq!(&dst[..], b"hello world");
        assert!(!encoder.is_finish());
    }
}
