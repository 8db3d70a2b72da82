//! The wire-level engine of an HTTP/1.x server.
//!
//! The engine accepts raw connections, drives one application callable per request and writes
//! a correctly framed HTTP/1.0 or HTTP/1.1 response back onto the socket:
//!
//! - non-blocking acceptance ([`connection::ConnectionAcceptor`])
//! - response framing, fixed-length, chunked or no body ([`connection::ResponseWriter`])
//! - keep-alive negotiation and `TCP_CORK` batching ([`connection::cork`])
//! - back-pressure aware writes bounded by a timeout ([`connection::fast_write`])
//! - request hijacking, asynchronous answers and after-reply callbacks ([`protocol::RequestContext`])
//! - application failures turned into `500` responses ([`handler::ErrorFallback`])
//!
//! # Example
//!
//! ```no_run
//! use plumb_http::Server;
//! use plumb_http::handler::{AppError, make_application};
//! use plumb_http::protocol::{RequestContext, Response};
//! use tracing::{Level, error};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let app = make_application(|env: &mut RequestContext| {
//!         Ok::<_, AppError>(Response::ok(format!("Hello {}\r\n", env.path())))
//!     });
//!
//!     let server = Server::builder().bind("127.0.0.1:8080").application(app).build().expect("valid server");
//!     if let Err(e) = server.start().await {
//!         error!(cause = %e, "server stopped");
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: request decoding and response head / body encoding
//! - [`connection`]: sockets, acceptance, the response writer and the per-connection loop
//! - [`handler`]: the application contract, error fallback and the request adapter
//! - [`protocol`]: shared types and errors
//! - [`config`]: engine options
//!
//! # Limitations
//!
//! - HTTP/1.x only, no TLS
//! - no `100-continue`
//! - at most 64 request headers and 8 KiB of request head

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
mod server;
mod utils;

pub use config::{Options, OptionsBuilder};
pub use server::{Server, ServerBuildError, ServerBuilder, ServerError};
