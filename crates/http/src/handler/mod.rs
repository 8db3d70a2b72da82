//! The application contract and everything the engine wraps around a call.
//!
//! - [`Application`]: the callable driven once per request, returning a [`Response`](crate::protocol::Response)
//! - [`AppError`]: what an application fails with; panics are converted into one
//! - [`ErrorReporter`] / [`LowlevelErrorHandler`] / [`ErrorFallback`]: how failures are reported and
//!   turned into a `500` response
//! - [`RequestAdapter`]: one request/response cycle from the application call to cleanup

mod adapter;
mod application;
mod error;
mod fallback;

pub use adapter::RequestAdapter;
pub use application::AppFn;
pub use application::Application;
pub use application::make_application;
pub use error::AppError;
pub use error::ErrorReporter;
pub use error::LogReporter;
pub use fallback::ErrorFallback;
pub use fallback::GENERIC_ERROR_BODY;
pub use fallback::LowlevelErrorHandler;
