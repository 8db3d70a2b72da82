//! Request and response body types.
//!
//! - [`InputBody`]: the request payload, fully read off the wire before the application runs
//! - [`Body`]: the response payload, a sequence of byte chunks either held in memory or produced
//!   by a stream, with an optional close callback

mod input_body;
mod response_body;

pub use input_body::InputBody;
pub use response_body::Body;
