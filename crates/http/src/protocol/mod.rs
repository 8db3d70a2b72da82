//! Core protocol types shared by the codec, the connection layer and the application contract.
//!
//! - **Message handling** ([`Message`], [`PayloadItem`], [`PayloadSize`]): units produced by the
//!   request decoder
//! - **Request side** ([`RequestHeader`], [`RequestContext`], [`body::InputBody`])
//! - **Response side** ([`Response`], [`Headers`], [`body::Body`], [`Outcome`])
//! - **Errors** ([`HttpError`], [`ParseError`], [`ConnectionError`], [`AcceptError`])

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::ConnectionToken;
pub use request::RequestHeader;

mod headers;
pub use headers::Headers;

mod response;
pub use response::ASYNC_STATUS;
pub use response::Outcome;
pub use response::Response;
pub use response::ResponseHead;

mod context;
pub use context::RequestContext;

mod error;
pub use error::AcceptError;
pub use error::ConnectionError;
pub use error::HttpError;
pub use error::ParseError;

pub mod body;

/// Boxed error used where the concrete error type is not interesting.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
