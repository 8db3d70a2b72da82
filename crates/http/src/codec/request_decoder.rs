//! Streaming request decoder.
//!
//! Decodes the head with [`HeaderDecoder`], then hands over to a [`PayloadDecoder`] until the body
//! is complete, so one decoder instance serves every request on a keep-alive connection.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decodes a request head, then its body.
///
/// `payload_decoder` is `None` while a head is expected.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether the decoder is in the middle of a request body.
    pub fn in_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn pipelined_requests() {
        let str = indoc! {r##"
        POST /submit HTTP/1.1
        Content-Length: 5

        helloGET /next HTTP/1.1

        "##};
        let mut buf = BytesMut::from(str.replace('\n', "\r\n").as_str());
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected a request head");
        };
        assert_eq!(header.path(), "/submit");
        assert_eq!(size, PayloadSize::Length(5));
        assert!(decoder.in_payload());

        let Some(Message::Payload(chunk)) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected body bytes");
        };
        assert_eq!(chunk.as_bytes().map(|bytes| &bytes[..]), Some(&b"hello"[..]));

        let Some(Message::Payload(eof)) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected end of body");
        };
        assert!(eof.is_eof());
        assert!(!decoder.in_payload());

        let Some(Message::Header((header, size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected the second request head");
        };
        assert_eq!(header.path(), "/next");
        assert!(size.is_empty());
    }
}
