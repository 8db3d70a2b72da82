//! Body framing, in both directions.
//!
//! Request bodies are decoded by [`PayloadDecoder`] (`Content-Length` or chunked), response
//! bodies are framed by [`PayloadEncoder`] according to the [`TransferMode`](crate::codec::TransferMode)
//! the head encoder settled on.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
