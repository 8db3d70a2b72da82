//! Request head decoding and response head encoding.
//!
//! - [`HeaderDecoder`]: request line and header fields into a [`RequestHeader`](crate::protocol::RequestHeader)
//! - [`HeaderEncoder`]: status line and header fields into a [`LineBuffer`](crate::codec::LineBuffer),
//!   deciding the body [`TransferMode`] and keep-alive on the way

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::Framing;
pub use header_encoder::HeaderEncoder;
pub use header_encoder::Negotiation;
pub use header_encoder::TransferMode;
pub use header_encoder::status_allows_body;
