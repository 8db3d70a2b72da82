//! Socket corking.
//!
//! While a TCP socket is corked the kernel holds back partial frames, so the response head and
//! the first body segment leave in as few packets as possible. Corking is only a hint: every
//! failure is logged at trace level and otherwise ignored.

use std::sync::Arc;

use tracing::trace;

use crate::connection::Socket;

pub trait CorkStrategy: Send + Sync {
    fn cork(&self, socket: &dyn Socket);

    fn uncork(&self, socket: &dyn Socket);
}

/// `TCP_CORK`, available on linux and android.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpCork;

impl CorkStrategy for TcpCork {
    fn cork(&self, socket: &dyn Socket) {
        if let Err(e) = socket.set_cork(true) {
            trace!(cause = %e, "cork socket failed");
        }
    }

    fn uncork(&self, socket: &dyn Socket) {
        if let Err(e) = socket.set_cork(false) {
            trace!(cause = %e, "uncork socket failed");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCork;

impl CorkStrategy for NoCork {
    fn cork(&self, _socket: &dyn Socket) {}

    fn uncork(&self, _socket: &dyn Socket) {}
}

/// Picks the strategy the current platform supports.
pub fn detect() -> Arc<dyn CorkStrategy> {
    if cfg!(any(target_os = "linux", target_os = "android")) { Arc::new(TcpCork) } else { Arc::new(NoCork) }
}

/// Keeps a socket corked for as long as it lives.
pub(crate) struct CorkGuard {
    socket: Arc<dyn Socket>,
    strategy: Arc<dyn CorkStrategy>,
}

impl CorkGuard {
    pub(crate) fn new(socket: Arc<dyn Socket>, strategy: Arc<dyn CorkStrategy>) -> Self {
        strategy.cork(socket.as_ref());
        Self { socket, strategy }
    }
}

impl Drop for CorkGuard {
    fn drop(&mut self) {
        self.strategy.uncork(self.socket.as_ref());
    }
}
