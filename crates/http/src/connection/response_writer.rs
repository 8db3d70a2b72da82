//! Per-response framing state bound to one connection.
//!
//! A [`ResponseWriter`] walks through `Idle -> HeaderWritten -> Streaming -> Finalized`. The
//! transfer mode is chosen when the head is written and never changes afterwards; setters called
//! outside `Idle` are ignored with a warning. [`hijack`](ResponseWriter::hijack) can leave any
//! state for `Hijacked`, after which the writer never touches the socket again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::codec::Encoder;
use tracing::{trace, warn};

use crate::codec::{HeaderEncoder, LineBuffer, Negotiation, PayloadEncoder, TransferMode};
use crate::connection::cork::{self, CorkGuard, CorkStrategy};
use crate::connection::socket::{Socket, fast_write};
use crate::protocol::body::Body;
use crate::protocol::{ConnectionError, Headers, PayloadItem, ResponseHead};

/// Default bound for a single wait on socket writability
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    HeaderWritten,
    Streaming,
    Finalized,
    Hijacked,
}

pub struct ResponseWriter {
    socket: Option<Arc<dyn Socket>>,
    cork_strategy: Arc<dyn CorkStrategy>,
    cork: Option<CorkGuard>,
    write_timeout: Duration,
    lines: LineBuffer,
    negotiation: Negotiation,
    head: ResponseHead,
    state: WriterState,
    transfer_mode: Option<TransferMode>,
    keep_alive: bool,
    encoder: PayloadEncoder,
}

impl ResponseWriter {
    pub fn new(socket: Arc<dyn Socket>, negotiation: Negotiation) -> Self {
        Self {
            socket: Some(socket),
            cork_strategy: cork::detect(),
            cork: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            lines: LineBuffer::new(),
            negotiation,
            head: ResponseHead::new(200),
            state: WriterState::Idle,
            transfer_mode: None,
            keep_alive: false,
            encoder: PayloadEncoder::empty(),
        }
    }

    pub fn with_cork(mut self, strategy: Arc<dyn CorkStrategy>) -> Self {
        self.cork_strategy = strategy;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn set_status(&mut self, status: u16) {
        if self.ensure_idle("set_status") {
            self.head.set_status(status);
        }
    }

    pub fn set_headers(&mut self, headers: Headers) {
        if self.ensure_idle("set_headers") {
            self.head.set_headers(headers);
        }
    }

    pub fn set_content_length(&mut self, content_length: Option<u64>) {
        if self.ensure_idle("set_content_length") {
            self.head.set_content_length(content_length);
        }
    }

    /// Closes the connection after this response whatever the request asked for.
    pub fn close_connection(&mut self) {
        if self.ensure_idle("close_connection") {
            self.negotiation = self.negotiation.closing();
        }
    }

    /// Encodes and sends the status line and headers, fixing the transfer mode and keep-alive
    /// decision for the rest of the response.
    ///
    /// The socket is corked first and stays corked until [`finalize`](ResponseWriter::finalize).
    pub async fn write_header(&mut self) -> Result<(), ConnectionError> {
        if self.state != WriterState::Idle {
            return Err(ConnectionError::invalid_state(format!("write_header in state {:?}", self.state)));
        }
        let socket = self.socket.clone().ok_or_else(|| ConnectionError::invalid_state("socket released"))?;

        if self.cork.is_none() {
            self.cork = Some(CorkGuard::new(Arc::clone(&socket), Arc::clone(&self.cork_strategy)));
        }

        self.lines.clear();
        let framing = HeaderEncoder.encode(&self.negotiation, &self.head, &mut self.lines);
        self.state = WriterState::HeaderWritten;
        self.transfer_mode = Some(framing.mode);
        self.keep_alive = framing.keep_alive;
        self.encoder = PayloadEncoder::from(framing);

        fast_write(socket.as_ref(), self.lines.as_bytes(), self.write_timeout).await
    }

    /// Writes one body chunk with the framing of the current transfer mode.
    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), ConnectionError> {
        match self.state {
            WriterState::HeaderWritten | WriterState::Streaming => {}
            state => return Err(ConnectionError::invalid_state(format!("write_chunk in state {state:?}"))),
        }
        self.state = WriterState::Streaming;

        if self.encoder.is_empty() {
            trace!(len = chunk.len(), "discard body chunk of a response without body");
            return Ok(());
        }

        self.lines.clear();
        self.encoder.encode(PayloadItem::Chunk(chunk), self.lines.buf_mut())?;
        self.send_lines().await
    }

    /// Writes every chunk of `body` in order, each pushed straight to the socket.
    pub async fn write_body(&mut self, body: &mut Body) -> Result<(), ConnectionError> {
        while let Some(chunk) = body.next_chunk().await {
            let chunk = chunk.map_err(ConnectionError::invalid_body)?;
            self.write_chunk(chunk).await?;
        }
        Ok(())
    }

    /// Every write already reached the socket when it returned.
    pub async fn flush(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    /// Completes the response, writing the chunked terminator if needed.
    ///
    /// The socket is uncorked whatever the outcome of the last write. Calling it again is a no-op.
    pub async fn finalize(&mut self) -> Result<(), ConnectionError> {
        let _cork = self.cork.take();

        match self.state {
            WriterState::HeaderWritten | WriterState::Streaming => {}
            WriterState::Idle => {
                self.state = WriterState::Finalized;
                return Ok(());
            }
            WriterState::Finalized | WriterState::Hijacked => return Ok(()),
        }
        self.state = WriterState::Finalized;

        self.lines.clear();
        self.encoder.encode(PayloadItem::<Bytes>::Eof, self.lines.buf_mut())?;
        if self.lines.is_empty() {
            return Ok(());
        }
        self.send_lines().await
    }

    /// Gives the socket up; no framing happens for this response any more.
    ///
    /// Only the first call returns the socket.
    pub fn hijack(&mut self) -> Option<Arc<dyn Socket>> {
        self.cork.take();
        self.state = WriterState::Hijacked;
        self.socket.take()
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// `None` until the head is written.
    pub fn transfer_mode(&self) -> Option<TransferMode> {
        self.transfer_mode
    }

    /// Whether the connection may serve another request, known once the head is written.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn status(&self) -> u16 {
        self.head.status()
    }

    pub fn socket(&self) -> Option<&Arc<dyn Socket>> {
        self.socket.as_ref()
    }

    async fn send_lines(&self) -> Result<(), ConnectionError> {
        let socket = self.socket.as_deref().ok_or_else(|| ConnectionError::invalid_state("socket released"))?;
        fast_write(socket, self.lines.as_bytes(), self.write_timeout).await
    }

    fn ensure_idle(&self, operation: &'static str) -> bool {
        let idle = self.state == WriterState::Idle;
        if !idle {
            warn!(operation, state = ?self.state, "ignore response change after the head was written");
        }
        idle
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("state", &self.state)
            .field("head", &self.head)
            .field("transfer_mode", &self.transfer_mode)
            .field("keep_alive", &self.keep_alive)
            .field("corked", &self.cork.is_some())
            .finish_non_exhaustive()
    }
}
