//! Request head decoder.
//!
//! Parses the request line and header fields with `httparse`, then turns the result into a
//! [`RequestHeader`] and the [`PayloadSize`] of the body that follows.
//!
//! # Limits
//!
//! - at most 64 header fields
//! - at most 8 KiB for the whole head
//! - HTTP/1.0 and HTTP/1.1 only
//!
//! Header names and values are not copied out of the read buffer: their byte ranges are recorded
//! while the parser still borrows it, and the values are sliced from the frozen head afterwards.

use std::mem::MaybeUninit;
use std::ops::Range;

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};
use crate::utils::ensure;

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a request head into a [`RequestHeader`] and the size of its body.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// `Ok(None)` while the head is incomplete. The head bytes are consumed on success, the
    /// body bytes are left in `src`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest possible head: "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers = [const { MaybeUninit::<httparse::Header<'_>>::uninit() }; MAX_HEADER_NUM];

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let header_count = req.headers.len();

                let mut spans = [HeaderSpan::EMPTY; MAX_HEADER_NUM];
                HeaderSpan::record(src, req.headers, &mut spans);

                let version = match req.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(req.version)),
                };

                let method = req.method.ok_or(ParseError::InvalidMethod)?;
                let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
                let uri = req.path.ok_or(ParseError::InvalidUri)?;
                let uri = Uri::try_from(uri).map_err(|_| ParseError::InvalidUri)?;

                let mut request = Request::new(());
                *request.method_mut() = method;
                *request.uri_mut() = uri;
                *request.version_mut() = version;

                let headers = request.headers_mut();
                headers.reserve(header_count);

                let header_bytes = src.split_to(body_offset).freeze();
                for span in &spans[..header_count] {
                    let name = HeaderName::from_bytes(&header_bytes[span.name.clone()]).map_err(ParseError::invalid_header)?;
                    let value =
                        HeaderValue::from_maybe_shared(header_bytes.slice(span.value.clone())).map_err(ParseError::invalid_header)?;
                    headers.append(name, value);
                }

                let header = RequestHeader::from(request);
                let payload_size = parse_payload(&header)?;

                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Where a header name and value sit inside the head, so they can be sliced once it is frozen.
#[derive(Clone)]
struct HeaderSpan {
    name: Range<usize>,
    value: Range<usize>,
}

impl HeaderSpan {
    const EMPTY: HeaderSpan = HeaderSpan { name: 0..0, value: 0..0 };

    fn record(head: &[u8], headers: &[httparse::Header<'_>], spans: &mut [HeaderSpan]) {
        let base = head.as_ptr() as usize;
        let offset = |part: &[u8]| {
            let start = part.as_ptr() as usize - base;
            start..start + part.len()
        };
        for (header, span) in headers.iter().zip(spans.iter_mut()) {
            span.name = offset(header.name.as_bytes());
            span.value = offset(header.value);
        }
    }
}

/// Picks the body framing from `Transfer-Encoding` and `Content-Length`, whatever the method.
///
/// A transfer coding other than a final `chunked` leaves the body length unknown, so the request
/// is rejected rather than read as empty. Having both headers, or `Content-Length` values that
/// disagree, is rejected as well.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    let te_header = header.headers().get_all(http::header::TRANSFER_ENCODING).iter().next_back();
    let has_cl = header.headers().contains_key(http::header::CONTENT_LENGTH);

    match (te_header, has_cl) {
        (None, false) => Ok(PayloadSize::Empty),

        (te_value @ Some(_), false) => {
            ensure!(is_chunked(te_value), ParseError::invalid_header("transfer-encoding does not end with chunked"));
            Ok(PayloadSize::Chunked)
        }

        (None, true) => content_length(header).map(PayloadSize::Length),

        (Some(_), true) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Every `Content-Length` field line, and every comma separated entry in it, must carry the same
/// decimal value.
fn content_length(header: &RequestHeader) -> Result<u64, ParseError> {
    let mut length = None;
    for value in header.headers().get_all(http::header::CONTENT_LENGTH) {
        let cl_str = value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
        for entry in cl_str.split(',') {
            let entry = entry.trim();
            ensure!(
                !entry.is_empty() && entry.bytes().all(|b| b.is_ascii_digit()),
                ParseError::invalid_content_length(format!("value {cl_str} is not u64"))
            );
            let parsed = entry.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            match length {
                Some(previous) if previous != parsed => {
                    return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {parsed}")));
                }
                _ => length = Some(parsed),
            }
        }
    }
    length.ok_or_else(|| ParseError::invalid_content_length("empty value"))
}

/// `chunked` must be the last transfer coding to frame the body.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value
        && let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next()
    {
        return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ConnectionToken;
    use http::HeaderMap;
    use indoc::indoc;

    #[test]
    fn chunked_must_be_the_last_coding() {
        for (value, chunked) in [("chunked", true), ("gzip, chunked", true), (" CHUNKED ", true), ("chunked, gzip", false), ("gzip", false)] {
            let mut headers = HeaderMap::new();
            headers.insert(http::header::TRANSFER_ENCODING, HeaderValue::from_static(value));
            assert_eq!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)), chunked, "{value}");
        }
        assert!(!is_chunked(None));
    }

    #[test]
    fn body_bytes_stay_in_the_buffer() {
        let mut buf = BytesMut::from(indoc! {"
            POST /form HTTP/1.1
            Host: 127.0.0.1:9292
            Content-Length: 7

            a=1&b=2"});

        let (header, size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(size, PayloadSize::Length(7));
        assert_eq!(&buf[..], b"a=1&b=2");
    }

    #[test]
    fn from_curl() {
        let mut buf = BytesMut::from(indoc! {"
            HEAD /status?verbose=1 HTTP/1.1
            Host: 127.0.0.1:9292
            User-Agent: curl/8.5.0
            Accept: */*

        "});

        let (header, size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert!(size.is_empty());
        assert!(header.is_head());
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/status");
        assert_eq!(header.uri().query(), Some("verbose=1"));
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/8.5.0")));
        assert!(buf.is_empty());
    }

    #[test]
    fn from_browser() {
        let mut buf = BytesMut::from(indoc! {r#"
            GET /assets/app.js?v=3 HTTP/1.1
            Host: shop.example.com
            Connection: Keep-Alive
            sec-ch-ua: "Chromium";v="128", "Not;A=Brand";v="24"
            User-Agent: Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36
            Accept: */*
            Accept-Encoding: gzip, deflate, br, zstd
            Cookie: session=8f1c2b7e4d3a9f60; theme=dark

        "#});

        let (header, _) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(header.connection(), ConnectionToken::KeepAlive);
        assert_eq!(header.headers().len(), 7);
        assert_eq!(
            header.headers().get("sec-ch-ua"),
            Some(&HeaderValue::from_static(r#""Chromium";v="128", "Not;A=Brand";v="24""#))
        );
        assert_eq!(header.headers().get(http::header::COOKIE), Some(&HeaderValue::from_static("session=8f1c2b7e4d3a9f60; theme=dark")));
    }

    #[test]
    fn payload_size_from_headers() {
        let mut chunked = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: gzip, Chunked\r\n\r\n");
        let (_, size) = HeaderDecoder.decode(&mut chunked).unwrap().unwrap();
        assert!(size.is_chunked());

        let mut length = BytesMut::from("POST /upload HTTP/1.0\r\nContent-Length: 12\r\n\r\n");
        let (header, size) = HeaderDecoder.decode(&mut length).unwrap().unwrap();
        assert_eq!(size, PayloadSize::Length(12));
        assert_eq!(header.version(), Version::HTTP_10);

        let mut both = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 1\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(matches!(HeaderDecoder.decode(&mut both), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn unknown_transfer_coding_is_rejected() {
        for value in ["gzip", "chunked, gzip", "identity"] {
            let mut buf = BytesMut::from(format!("POST /upload HTTP/1.1\r\nTransfer-Encoding: {value}\r\n\r\nGET /admin HTTP/1.1\r\n\r\n").as_str());
            assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::InvalidHeader { .. })), "{value}");
        }

        // only the last field line decides
        let mut split = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\nTransfer-Encoding: gzip\r\n\r\n");
        assert!(HeaderDecoder.decode(&mut split).is_err());

        let mut last = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: gzip\r\nTransfer-Encoding: chunked\r\n\r\n");
        let (_, size) = HeaderDecoder.decode(&mut last).unwrap().unwrap();
        assert!(size.is_chunked());
    }

    #[test]
    fn content_length_values_must_agree() {
        let mut repeated = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\n");
        let (_, size) = HeaderDecoder.decode(&mut repeated).unwrap().unwrap();
        assert_eq!(size, PayloadSize::Length(5));

        let mut listed = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 5, 5\r\n\r\n");
        let (_, size) = HeaderDecoder.decode(&mut listed).unwrap().unwrap();
        assert_eq!(size, PayloadSize::Length(5));

        for head in [
            "POST / HTTP/1.1\r\nContent-Length: 0\r\nContent-Length: 40\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: 0, 40\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: +4\r\n\r\n",
            "POST / HTTP/1.1\r\nContent-Length: ,\r\n\r\n",
        ] {
            let mut buf = BytesMut::from(head);
            assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::InvalidContentLength { .. })), "{head:?}");
        }
    }

    #[test]
    fn delete_with_body_is_framed() {
        let mut buf = BytesMut::from("DELETE /items HTTP/1.1\r\nContent-Length: 2\r\n\r\n[]GET / HTTP/1.1\r\n\r\n");
        let (_, size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(size, PayloadSize::Length(2));
        assert!(buf.starts_with(b"[]GET"));
    }

    #[test]
    fn partial_head_waits() {
        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: exa");
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 35);
    }

    #[test]
    fn limits() {
        let mut many = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADER_NUM {
            many.push_str(&format!("X-{i}: v\r\n"));
        }
        many.push_str("\r\n");
        assert!(matches!(HeaderDecoder.decode(&mut BytesMut::from(many.as_str())), Err(ParseError::TooManyHeaders { .. })));

        let large = format!("GET / HTTP/1.1\r\nX-Large: {}", "a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(HeaderDecoder.decode(&mut BytesMut::from(large.as_str())), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn rejects_garbage() {
        let mut buf = BytesMut::from("NOT AN HTTP REQUEST\r\n\r\n");
        assert!(HeaderDecoder.decode(&mut buf).is_err());
    }
}
