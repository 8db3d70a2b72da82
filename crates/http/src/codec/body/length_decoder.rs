use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Body framed by `Content-Length`: hands out whatever is buffered, never more than what remains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Body bytes still expected on the wire.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // bytes after the body belong to the next pipelined request
        let take = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
        let chunk = src.split_to(take).freeze();
        self.remaining -= chunk.len() as u64;
        Ok(Some(PayloadItem::Chunk(chunk)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_the_next_request_alone() {
        let mut buffer = BytesMut::from(&b"name=plumbGET / HTTP/1.1\r\n"[..]);
        let mut decoder = LengthDecoder::new(10);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().map(|bytes| &bytes[..]), Some(&b"name=plumb"[..]));
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n");
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }

    #[test]
    fn body_split_across_reads() {
        let mut decoder = LengthDecoder::new(5);
        let mut buffer = BytesMut::from(&b"he"[..]);

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_chunk());
        assert_eq!(decoder.remaining(), 3);
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"llo");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_chunk());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn zero_length_is_immediately_done() {
        let mut buffer = BytesMut::new();
        assert_eq!(LengthDecoder::new(0).decode(&mut buffer).unwrap(), Some(PayloadItem::Eof));
    }
}
