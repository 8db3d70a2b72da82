//! Connection handling.
//!
//! - [`ConnectionAcceptor`]: non-blocking accept over tokio and std listeners
//! - [`Socket`]: the object-safe raw connection, with [`fast_write`] as the only write primitive
//! - [`cork`]: pluggable `TCP_CORK` strategies
//! - [`ResponseWriter`]: response framing state bound to one connection
//! - [`HttpConnection`]: the keep-alive loop driving a [`RequestAdapter`](crate::handler::RequestAdapter)

mod acceptor;
pub mod cork;
mod http_connection;
mod response_writer;
pub(crate) mod socket;

pub use acceptor::Accepted;
pub use acceptor::ConnectionAcceptor;
pub use http_connection::HttpConnection;
pub use response_writer::DEFAULT_WRITE_TIMEOUT;
pub use response_writer::ResponseWriter;
pub use response_writer::WriterState;
pub use socket::PeerAddr;
pub use socket::Socket;
pub use socket::fast_write;
