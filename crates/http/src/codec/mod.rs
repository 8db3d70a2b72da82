//! Wire codecs for HTTP/1.x.
//!
//! # Request side
//!
//! [`RequestDecoder`] is a `tokio_util` [`Decoder`](tokio_util::codec::Decoder) producing the
//! request head first, then body chunks until [`PayloadItem::Eof`](crate::protocol::PayloadItem).
//!
//! # Response side
//!
//! [`HeaderEncoder`] writes the head into a [`LineBuffer`] and returns the [`Framing`] it chose;
//! [`PayloadEncoder`] then frames the body accordingly.
//!
//! ```
//! use http::Version;
//! use plumb_http::codec::{HeaderEncoder, LineBuffer, Negotiation, TransferMode};
//! use plumb_http::protocol::{ConnectionToken, ResponseHead};
//!
//! let negotiation = Negotiation::new(false, Version::HTTP_11, ConnectionToken::Unspecified);
//! let mut lines = LineBuffer::new();
//! let framing = HeaderEncoder.encode(&negotiation, &ResponseHead::new(200), &mut lines);
//!
//! assert_eq!(framing.mode, TransferMode::Chunked);
//! assert_eq!(lines.as_bytes(), b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
//! ```

mod body;
mod header;
mod line_buffer;
mod request_decoder;

pub use body::PayloadDecoder;
pub use body::PayloadEncoder;
pub use header::Framing;
pub use header::HeaderDecoder;
pub use header::HeaderEncoder;
pub use header::Negotiation;
pub use header::TransferMode;
pub use header::status_allows_body;
pub use line_buffer::LineBuffer;
pub use request_decoder::RequestDecoder;
