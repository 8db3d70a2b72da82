use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, trace};

use crate::codec::{Negotiation, RequestDecoder};
use crate::config::Options;
use crate::connection::socket::fast_write;
use crate::connection::{PeerAddr, ResponseWriter, Socket};
use crate::handler::{Application, RequestAdapter};
use crate::protocol::body::InputBody;
use crate::protocol::{HttpError, Message, Outcome, ParseError, PayloadItem, PayloadSize, RequestContext, RequestHeader};

const READ_CHUNK_SIZE: usize = 8 * 1024;
/// Upper bound of the buffer reserved up front for an announced request body
const MAX_BODY_PREALLOC: usize = 64 * 1024;

const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";
const PAYLOAD_TOO_LARGE: &[u8] = b"HTTP/1.1 413 Payload Too Large\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// Drives every request/response cycle of one connection.
///
/// Requests are read and decoded here, the request body is buffered completely, and each cycle is
/// handed to a [`RequestAdapter`]. The loop continues while responses keep the connection alive.
pub struct HttpConnection {
    socket: Arc<dyn Socket>,
    peer_addr: PeerAddr,
    options: Arc<Options>,
    decoder: RequestDecoder,
    buf: BytesMut,
    scratch: Box<[u8]>,
}

/// Why reading a request stopped without one
enum Stop {
    Closed,
    TimedOut,
}

impl HttpConnection {
    pub fn new(socket: Arc<dyn Socket>, peer_addr: PeerAddr, options: Arc<Options>) -> Self {
        Self {
            socket,
            peer_addr,
            options,
            decoder: RequestDecoder::new(),
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            scratch: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    pub fn peer_addr(&self) -> &PeerAddr {
        &self.peer_addr
    }

    /// Serves requests until the peer leaves, a response closes the connection, a timeout
    /// expires, or the application takes the connection over.
    ///
    /// A malformed request is answered with `400 Bad Request`, a body over
    /// [`Options::max_body_size`] with `413 Payload Too Large`. Both are returned as errors, like
    /// socket failures.
    pub async fn process<A: Application>(mut self, adapter: &RequestAdapter<A>) -> Result<(), HttpError> {
        let mut idle_timeout = self.options.first_data_timeout();

        loop {
            let (header, payload_size) = match self.read_head(idle_timeout).await? {
                Ok(head) => head,
                Err(Stop::Closed) => {
                    debug!(peer = %self.peer_addr, "peer closed connection");
                    return Ok(());
                }
                Err(Stop::TimedOut) => {
                    debug!(peer = %self.peer_addr, ?idle_timeout, "no request in time, closing connection");
                    return Ok(());
                }
            };

            let input = match self.read_body(payload_size).await? {
                Ok(input) => input,
                Err(_) => {
                    debug!(peer = %self.peer_addr, "request body incomplete, closing connection");
                    return Ok(());
                }
            };

            let started = Instant::now();
            let negotiation = Negotiation::from(&header);
            let mut env = RequestContext::new(header)
                .with_peer_addr(self.peer_addr.clone())
                .with_secure(self.options.secure());
            let mut writer = ResponseWriter::new(Arc::clone(&self.socket), negotiation)
                .with_cork(Arc::clone(self.options.cork()))
                .with_write_timeout(self.options.write_timeout());

            let outcome = adapter.handle(&mut env, InputBody::new(input), &mut writer).await?;

            match outcome {
                Outcome::Complete { keep_alive } => {
                    writer.finalize().await?;
                    if !self.options.quiet() {
                        info!(
                            peer = %self.peer_addr,
                            method = %env.method(),
                            path = env.path(),
                            status = writer.status(),
                            elapsed = ?started.elapsed(),
                            "request"
                        );
                    }
                    if !keep_alive {
                        debug!(peer = %self.peer_addr, "response closes the connection");
                        return Ok(());
                    }
                    idle_timeout = self.options.persistent_timeout();
                }
                Outcome::Async | Outcome::Hijacked => {
                    debug!(peer = %self.peer_addr, ?outcome, "connection released to the application");
                    return Ok(());
                }
            }
        }
    }

    async fn read_head(&mut self, timeout: Duration) -> Result<Result<(RequestHeader, PayloadSize), Stop>, HttpError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.decoder.decode(&mut self.buf) {
                Ok(Some(Message::Header(head))) => return Ok(Ok(head)),
                Ok(Some(Message::Payload(_))) => {
                    return Err(ParseError::invalid_body("body bytes while expecting a request head").into());
                }
                Ok(None) => {}
                Err(e) => {
                    error!(peer = %self.peer_addr, cause = %e, "can't decode request");
                    self.reject(BAD_REQUEST).await;
                    return Err(e.into());
                }
            }

            match tokio::time::timeout_at(deadline, self.fill()).await {
                Ok(Ok(0)) => return Ok(Err(Stop::Closed)),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => return Ok(Err(Stop::TimedOut)),
            }
        }
    }

    async fn read_body(&mut self, payload_size: PayloadSize) -> Result<Result<Bytes, Stop>, HttpError> {
        let max_size = self.options.max_body_size();
        if let (Some(length), Some(max_size)) = (payload_size.known_length(), max_size)
            && length > max_size
        {
            return Err(self.too_large(max_size).await);
        }

        let capacity = payload_size.known_length().map_or(0, |length| length.min(MAX_BODY_PREALLOC as u64) as usize);
        let mut body = BytesMut::with_capacity(capacity);
        let deadline = tokio::time::Instant::now() + self.options.first_data_timeout();

        loop {
            match self.decoder.decode(&mut self.buf) {
                Ok(Some(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    body.extend_from_slice(&bytes);
                    if let Some(max_size) = max_size
                        && body.len() as u64 > max_size
                    {
                        return Err(self.too_large(max_size).await);
                    }
                    continue;
                }
                Ok(Some(Message::Payload(PayloadItem::Eof))) => {
                    trace!(len = body.len(), "read request body");
                    return Ok(Ok(body.freeze()));
                }
                Ok(Some(Message::Header(_))) => {
                    return Err(ParseError::invalid_body("request head while reading a body").into());
                }
                Ok(None) => {}
                Err(e) => {
                    error!(peer = %self.peer_addr, cause = %e, "can't decode request body");
                    self.reject(BAD_REQUEST).await;
                    return Err(e.into());
                }
            }

            match tokio::time::timeout_at(deadline, self.fill()).await {
                Ok(Ok(0)) => return Ok(Err(Stop::Closed)),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => return Ok(Err(Stop::TimedOut)),
            }
        }
    }

    async fn fill(&mut self) -> Result<usize, ParseError> {
        let n = self.socket.read(&mut self.scratch).await.map_err(ParseError::io)?;
        self.buf.extend_from_slice(&self.scratch[..n]);
        Ok(n)
    }

    async fn too_large(&self, max_size: u64) -> HttpError {
        error!(peer = %self.peer_addr, max_size, "request body too large");
        self.reject(PAYLOAD_TOO_LARGE).await;
        ParseError::too_large_body(max_size).into()
    }

    async fn reject(&self, response: &[u8]) {
        if let Err(e) = fast_write(self.socket.as_ref(), response, self.options.write_timeout()).await {
            debug!(cause = %e, "failed to send error response");
        }
    }
}
