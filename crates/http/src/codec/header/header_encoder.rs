//! HTTP response head encoder.
//!
//! Serializes the status line and header block into a [`LineBuffer`] and decides, once and for the
//! whole response, how the body is framed and whether the connection stays open.
//!
//! # Rules
//!
//! - HTTP/1.1: chunked transfer allowed, keep-alive unless the client sent `Connection: close`,
//!   an explicit `Connection: close` is written when the connection will not be kept
//! - HTTP/1.0 and older: no chunked transfer, keep-alive only when the client asked for it, in
//!   which case `Connection: keep-alive` is echoed
//! - a `Content-Length` header field overrides the known length and is written in canonical position
//! - a `Transfer-Encoding` header field means the caller frames the body itself
//! - HEAD requests, 1xx and the no-entity statuses never carry a body

use http::{StatusCode, Version};
use tracing::{trace, warn};

use crate::codec::LineBuffer;
use crate::protocol::{ConnectionToken, Headers, RequestHeader, ResponseHead};

/// Pre-built status line for the most common response
pub const HTTP_11_200: &[u8] = b"HTTP/1.1 200 OK\r\n";
pub const HTTP_10_200: &[u8] = b"HTTP/1.0 200 OK\r\n";

const LINE_END: &[u8] = b"\r\n";
const COLON: &[u8] = b": ";
const CONTENT_LENGTH: &[u8] = b"Content-Length: ";
const TRANSFER_ENCODING_CHUNKED: &[u8] = b"Transfer-Encoding: chunked\r\n";
const CONNECTION_KEEP_ALIVE: &[u8] = b"Connection: keep-alive\r\n";
const CONNECTION_CLOSE: &[u8] = b"Connection: close\r\n";

/// Reason phrase for status codes without a canonical one
const UNKNOWN_REASON: &str = "CUSTOM";

/// How the body following a head is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferMode {
    /// raw bytes, delimited by `Content-Length` when known, by connection close otherwise
    FixedLength,
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// nothing may follow the head
    NoBody,
}

/// The request facts that decide framing and keep-alive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Negotiation {
    head: bool,
    version: Version,
    connection: ConnectionToken,
}

impl Negotiation {
    pub fn new(head: bool, version: Version, connection: ConnectionToken) -> Self {
        Self { head, version, connection }
    }

    pub fn is_head(&self) -> bool {
        self.head
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The same request facts, but the connection is not kept.
    pub fn closing(self) -> Self {
        Self { connection: ConnectionToken::Close, ..self }
    }
}

impl From<&RequestHeader> for Negotiation {
    fn from(header: &RequestHeader) -> Self {
        Self::new(header.is_head(), header.version(), header.connection())
    }
}

/// The decisions taken while encoding a head.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Framing {
    pub mode: TransferMode,
    pub content_length: Option<u64>,
    pub keep_alive: bool,
}

/// Encoder for HTTP response heads.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    /// Appends the status line and all header lines, terminated by the empty line, to `dst`.
    pub fn encode(&self, negotiation: &Negotiation, head: &ResponseHead, dst: &mut LineBuffer) -> Framing {
        let status = head.status();
        let http_11 = negotiation.version == Version::HTTP_11;

        let no_body = negotiation.head || !status_allows_body(status);
        let mut allow_chunked = http_11;
        let keep_alive = if http_11 {
            negotiation.connection != ConnectionToken::Close
        } else {
            negotiation.connection == ConnectionToken::KeepAlive
        };

        write_status_line(http_11, status, dst);

        let mut content_length = head.content_length();
        let mut caller_framed = false;
        write_headers(head.headers(), &mut content_length, &mut allow_chunked, &mut caller_framed, dst);

        if no_body {
            if let Some(length) = content_length
                && status != 204
            {
                write_content_length(length, dst);
            }
            dst.push(LINE_END);
            trace!(status, keep_alive, "encoded head without body");
            return Framing { mode: TransferMode::NoBody, content_length, keep_alive };
        }

        // a body running until close can't share the connection
        let close_delimited = content_length.is_none() && !allow_chunked && !caller_framed;
        let keep_alive = keep_alive && !close_delimited;

        if keep_alive && !http_11 {
            dst.push(CONNECTION_KEEP_ALIVE);
        } else if !keep_alive && http_11 {
            dst.push(CONNECTION_CLOSE);
        }

        let mode = if let Some(length) = content_length {
            write_content_length(length, dst);
            TransferMode::FixedLength
        } else if allow_chunked {
            dst.push(TRANSFER_ENCODING_CHUNKED);
            TransferMode::Chunked
        } else {
            TransferMode::FixedLength
        };

        dst.push(LINE_END);
        trace!(status, ?mode, content_length, keep_alive, "encoded head");
        Framing { mode, content_length, keep_alive }
    }
}

/// 1xx, 204, 205 and 304 responses never carry an entity body.
#[inline]
pub fn status_allows_body(status: u16) -> bool {
    !(status < 200 || matches!(status, 204 | 205 | 304))
}

fn write_status_line(http_11: bool, status: u16, dst: &mut LineBuffer) {
    match (http_11, status) {
        (true, 200) => dst.push(HTTP_11_200),
        (false, 200) => dst.push(HTTP_10_200),
        (http_11, status) => {
            let reason = StatusCode::from_u16(status).ok().and_then(|code| code.canonical_reason()).unwrap_or(UNKNOWN_REASON);
            dst.push(if http_11 { b"HTTP/1.1 " } else { b"HTTP/1.0 " });
            dst.push_decimal(u64::from(status));
            dst.append(&[b" ", reason.as_bytes(), LINE_END]);
        }
    }
}

fn write_headers(
    headers: &Headers,
    content_length: &mut Option<u64>,
    allow_chunked: &mut bool,
    caller_framed: &mut bool,
    dst: &mut LineBuffer,
) {
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("content-length") {
            match value.trim().parse::<u64>() {
                Ok(length) => *content_length = Some(length),
                Err(_) => warn!(value, "ignore invalid content-length header"),
            }
            continue;
        }

        if name.eq_ignore_ascii_case("transfer-encoding") {
            *allow_chunked = false;
            *caller_framed = true;
            *content_length = None;
        }

        for line in value.lines() {
            dst.append(&[name.as_bytes(), COLON, line.as_bytes(), LINE_END]);
        }
    }
}

fn write_content_length(length: u64, dst: &mut LineBuffer) {
    dst.push(CONTENT_LENGTH);
    dst.push_decimal(length);
    dst.push(LINE_END);
}
