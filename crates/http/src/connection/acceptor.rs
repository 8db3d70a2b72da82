//! Non-blocking connection acceptance.
//!
//! Tokio listeners expose a combined accept + peer address primitive which is polled once with a
//! no-op waker. A plain `std::net::TcpListener` goes through a non-blocking `accept` followed by a
//! separate peer address lookup. Both produce the same `(socket, peer address)` pair.
//!
//! A tokio listener keeps a single waker for `poll_accept`, which the no-op waker of
//! [`ConnectionAcceptor::try_accept`] replaces. [`ConnectionAcceptor::accept`] waits through the
//! listener's own `accept` future instead, whose waiters are kept apart from that slot, so both
//! may be used on the same acceptor concurrently.

use std::io;
use std::io::ErrorKind;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, trace};

use crate::connection::{PeerAddr, Socket};
use crate::protocol::AcceptError;

/// A freshly accepted connection.
pub type Accepted = (Arc<dyn Socket>, PeerAddr);

/// Back-off between accept attempts on a listener that can't notify readiness
const STD_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug)]
enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),
    Std(std::net::TcpListener),
}

/// Wraps a listening socket.
#[derive(Debug)]
pub struct ConnectionAcceptor {
    listener: Listener,
}

impl ConnectionAcceptor {
    /// Returns a pending connection, or `None` when nothing is waiting. Never blocks.
    ///
    /// An error concerns this attempt only, the listener stays usable.
    pub fn try_accept(&self) -> Result<Option<Accepted>, AcceptError> {
        match &self.listener {
            Listener::Std(listener) => accept_std(listener),
            _ => {
                let mut cx = Context::from_waker(Waker::noop());
                match self.poll_accept(&mut cx) {
                    Poll::Ready(result) => result.map(Some),
                    Poll::Pending => Ok(None),
                }
            }
        }
    }

    /// Waits for the next connection.
    pub async fn accept(&self) -> Result<Accepted, AcceptError> {
        loop {
            let accepted = match &self.listener {
                Listener::Tcp(listener) => listener.accept().await.map(tcp_accepted),
                #[cfg(unix)]
                Listener::Unix(listener) => listener.accept().await.map(unix_accepted),
                Listener::Std(listener) => match accept_std(listener)? {
                    Some(accepted) => return Ok(accepted),
                    None => {
                        tokio::time::sleep(STD_ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            if let Poll::Ready(result) = settle(accepted) {
                return result;
            }
        }
    }

    pub fn local_addr(&self) -> io::Result<PeerAddr> {
        match &self.listener {
            Listener::Tcp(listener) => listener.local_addr().map(PeerAddr::Tcp),
            #[cfg(unix)]
            Listener::Unix(listener) => {
                listener.local_addr().map(|addr| PeerAddr::Unix(addr.as_pathname().map(|path| path.to_path_buf())))
            }
            Listener::Std(listener) => listener.local_addr().map(PeerAddr::Tcp),
        }
    }

    fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<Result<Accepted, AcceptError>> {
        let accepted = match &self.listener {
            Listener::Tcp(listener) => match listener.poll_accept(cx) {
                Poll::Ready(result) => result.map(tcp_accepted),
                Poll::Pending => return Poll::Pending,
            },
            #[cfg(unix)]
            Listener::Unix(listener) => match listener.poll_accept(cx) {
                Poll::Ready(result) => result.map(unix_accepted),
                Poll::Pending => return Poll::Pending,
            },
            // no readiness notification, callers go through accept_std
            Listener::Std(_) => return Poll::Pending,
        };
        settle(accepted)
    }
}

fn tcp_accepted((stream, addr): (TcpStream, std::net::SocketAddr)) -> Accepted {
    (Arc::new(stream) as Arc<dyn Socket>, PeerAddr::Tcp(addr))
}

#[cfg(unix)]
fn unix_accepted((stream, addr): (tokio::net::UnixStream, tokio::net::unix::SocketAddr)) -> Accepted {
    let peer = PeerAddr::Unix(addr.as_pathname().map(|path| path.to_path_buf()));
    (Arc::new(stream) as Arc<dyn Socket>, peer)
}

/// `Pending` for a spurious wake-up, the listener stays usable after any error.
fn settle(accepted: io::Result<Accepted>) -> Poll<Result<Accepted, AcceptError>> {
    match accepted {
        Ok(accepted) => {
            trace!(peer = %accepted.1, "accepted connection");
            Poll::Ready(Ok(accepted))
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => Poll::Pending,
        Err(e) => {
            debug!(cause = %e, "accept failed");
            Poll::Ready(Err(AcceptError::from(e)))
        }
    }
}

fn accept_std(listener: &std::net::TcpListener) -> Result<Option<Accepted>, AcceptError> {
    let stream = match listener.accept() {
        Ok((stream, _)) => stream,
        Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
        Err(e) => return Err(AcceptError::from(e)),
    };

    let peer = stream.peer_addr()?;
    stream.set_nonblocking(true)?;
    let stream = TcpStream::from_std(stream)?;
    trace!(%peer, "accepted connection");
    Ok(Some((Arc::new(stream) as Arc<dyn Socket>, PeerAddr::Tcp(peer))))
}

impl From<TcpListener> for ConnectionAcceptor {
    fn from(listener: TcpListener) -> Self {
        Self { listener: Listener::Tcp(listener) }
    }
}

#[cfg(unix)]
impl From<tokio::net::UnixListener> for ConnectionAcceptor {
    fn from(listener: tokio::net::UnixListener) -> Self {
        Self { listener: Listener::Unix(listener) }
    }
}

impl TryFrom<std::net::TcpListener> for ConnectionAcceptor {
    type Error = io::Error;

    /// Switches the listener to non-blocking mode.
    fn try_from(listener: std::net::TcpListener) -> Result<Self, Self::Error> {
        listener.set_nonblocking(true)?;
        Ok(Self { listener: Listener::Std(listener) })
    }
}
