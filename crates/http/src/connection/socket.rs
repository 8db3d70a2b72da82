//! The raw connection seen by the engine.
//!
//! [`Socket`] is readiness based (`try_*` plus `poll_*_ready`) and object safe. The same
//! `Arc<dyn Socket>` is written by the response writer, published into the
//! request context and handed to the application on hijack.

use std::fmt;
use std::future::poll_fn;
use std::io;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::trace;

use crate::protocol::ConnectionError;

pub trait Socket: fmt::Debug + Send + Sync {
    /// Reads without waiting, `WouldBlock` when nothing is buffered.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;

    /// Writes without waiting, `WouldBlock` when the send buffer is full.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;

    fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;

    /// Toggles the transport's cork option, `Unsupported` where there is none.
    fn set_cork(&self, corked: bool) -> io::Result<()> {
        let _ = corked;
        Err(io::Error::from(ErrorKind::Unsupported))
    }
}

impl dyn Socket {
    /// Waits until data is available and reads it, `Ok(0)` means the peer closed.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            poll_fn(|cx| self.poll_read_ready(cx)).await?;
            match self.try_read(buf) {
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                result => return result,
            }
        }
    }

    /// Writes the whole buffer, waiting for writability as long as needed.
    pub async fn write_all(&self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.try_write(buf) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == ErrorKind::WouldBlock => poll_fn(|cx| self.poll_write_ready(cx)).await?,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Writes `buf` completely, re-issuing partial writes with the unwritten remainder.
///
/// Each would-block condition waits at most `write_timeout` for the socket to become writable,
/// an expired wait fails with [`ConnectionError::WriteTimeout`].
pub async fn fast_write(socket: &dyn Socket, mut buf: &[u8], write_timeout: Duration) -> Result<(), ConnectionError> {
    while !buf.is_empty() {
        match socket.try_write(buf) {
            Ok(0) => return Err(ConnectionError::io(ErrorKind::WriteZero)),
            Ok(n) => {
                trace!(written = n, remaining = buf.len() - n, "socket write");
                buf = &buf[n..];
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                match tokio::time::timeout(write_timeout, poll_fn(|cx| socket.poll_write_ready(cx))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(ConnectionError::io(e)),
                    Err(_elapsed) => return Err(ConnectionError::WriteTimeout),
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(ConnectionError::io(e)),
        }
    }
    Ok(())
}

impl Socket for TcpStream {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::try_read(self, buf)
    }

    fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        TcpStream::poll_read_ready(self, cx)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        TcpStream::try_write(self, buf)
    }

    fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        TcpStream::poll_write_ready(self, cx)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn set_cork(&self, corked: bool) -> io::Result<()> {
        socket2::SockRef::from(self).set_cork(corked)
    }
}

#[cfg(unix)]
impl Socket for tokio::net::UnixStream {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::net::UnixStream::try_read(self, buf)
    }

    fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        tokio::net::UnixStream::poll_read_ready(self, cx)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        tokio::net::UnixStream::try_write(self, buf)
    }

    fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        tokio::net::UnixStream::poll_write_ready(self, cx)
    }
}

/// The remote end of an accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddr {
    Tcp(SocketAddr),
    /// unix socket peers are usually unnamed
    Unix(Option<PathBuf>),
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddr::Tcp(addr) => write!(f, "{addr}"),
            PeerAddr::Unix(Some(path)) => write!(f, "unix:{}", path.display()),
            PeerAddr::Unix(None) => f.write_str("unix:(unnamed)"),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A scripted in-memory socket.
    #[derive(Debug, Default)]
    pub(crate) struct MockSocket {
        state: Mutex<MockState>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        input: VecDeque<u8>,
        written: Vec<u8>,
        max_write: Option<usize>,
        would_block: usize,
        stalled: bool,
        fail_with: Option<ErrorKind>,
        cork_calls: Vec<bool>,
    }

    impl MockSocket {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Bytes the peer "sent"; once drained, reads report EOF.
        pub(crate) fn with_input(input: &[u8]) -> Self {
            let socket = Self::default();
            socket.state().input.extend(input);
            socket
        }

        /// Accepts at most `n` bytes per write call.
        pub(crate) fn max_write(self, n: usize) -> Self {
            self.state().max_write = Some(n);
            self
        }

        /// The next `n` write calls report `WouldBlock`, the socket turns writable right after.
        pub(crate) fn would_block(self, n: usize) -> Self {
            self.state().would_block = n;
            self
        }

        /// Every write reports `WouldBlock` and the socket never turns writable.
        pub(crate) fn stalled(self) -> Self {
            self.state().stalled = true;
            self
        }

        pub(crate) fn failing(self, kind: ErrorKind) -> Self {
            self.state().fail_with = Some(kind);
            self
        }

        pub(crate) fn written(&self) -> Vec<u8> {
            self.state().written.clone()
        }

        pub(crate) fn written_str(&self) -> String {
            String::from_utf8(self.written()).unwrap()
        }

        pub(crate) fn cork_calls(&self) -> Vec<bool> {
            self.state().cork_calls.clone()
        }

        fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap()
        }
    }

    impl Socket for MockSocket {
        fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
            let mut state = self.state();
            let len = state.input.len().min(buf.len());
            for (slot, byte) in buf.iter_mut().zip(state.input.drain(..len)) {
                *slot = byte;
            }
            Ok(len)
        }

        fn poll_read_ready(&self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
            let mut state = self.state();
            if let Some(kind) = state.fail_with {
                return Err(io::Error::from(kind));
            }
            if state.stalled {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
            if state.would_block > 0 {
                state.would_block -= 1;
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
            let len = state.max_write.map_or(buf.len(), |max| max.min(buf.len()));
            state.written.extend_from_slice(&buf[..len]);
            Ok(len)
        }

        fn poll_write_ready(&self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            if self.state().stalled { Poll::Pending } else { Poll::Ready(Ok(())) }
        }

        fn set_cork(&self, corked: bool) -> io::Result<()> {
            self.state().cork_calls.push(corked);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockSocket;
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn partial_writes_are_resumed() {
        let socket = MockSocket::new().max_write(3);
        fast_write(&socket, b"hello world", TIMEOUT).await.unwrap();
        assert_eq!(socket.written(), b"hello world");
    }

    #[tokio::test]
    async fn would_block_waits_for_writability() {
        let socket = MockSocket::new().would_block(2);
        fast_write(&socket, b"abc", TIMEOUT).await.unwrap();
        assert_eq!(socket.written(), b"abc");
    }

    #[tokio::test]
    async fn stalled_socket_times_out() {
        let socket = MockSocket::new().stalled();
        let result = fast_write(&socket, b"abc", TIMEOUT).await;
        assert!(matches!(result, Err(ConnectionError::WriteTimeout)));
    }

    #[tokio::test]
    async fn io_failure_is_wrapped() {
        let socket = MockSocket::new().failing(ErrorKind::BrokenPipe);
        let result = fast_write(&socket, b"abc", TIMEOUT).await;
        match result {
            Err(ConnectionError::Io { source }) => assert_eq!(source.kind(), ErrorKind::BrokenPipe),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn dyn_read_reports_eof() {
        let socket: std::sync::Arc<dyn Socket> = std::sync::Arc::new(MockSocket::with_input(b"ping"));
        let mut buf = [0u8; 8];
        assert_eq!(socket.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");
        assert_eq!(socket.read(&mut buf).await.unwrap(), 0);
    }

    #[test]
    fn peer_addr_display() {
        let addr = PeerAddr::Tcp("127.0.0.1:9292".parse().unwrap());
        assert_eq!(addr.to_string(), "127.0.0.1:9292");
        assert_eq!(PeerAddr::Unix(None).to_string(), "unix:(unnamed)");
    }
}
