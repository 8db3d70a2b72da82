//! The per-request environment handed to the application.

use std::fmt;
use std::sync::Arc;

use http::{Extensions, HeaderMap, Method, Uri, Version};

use crate::connection::{PeerAddr, Socket};
use crate::protocol::RequestHeader;
use crate::protocol::body::InputBody;

type AfterReply = Box<dyn FnOnce() + Send>;

/// Everything the application gets to see about one request.
///
/// Created by the connection owner for every request, completed by the request adapter (socket,
/// hijack capability, input body, URL scheme) and dropped when the cycle ends.
pub struct RequestContext {
    header: RequestHeader,
    peer_addr: Option<PeerAddr>,
    secure: bool,
    url_scheme: &'static str,
    head: bool,
    input: InputBody,
    socket: Option<Arc<dyn Socket>>,
    hijack: Option<Hijack>,
    after_reply: Vec<AfterReply>,
    extensions: Extensions,
}

struct Hijack {
    socket: Arc<dyn Socket>,
    hijacked: bool,
    io: Option<Arc<dyn Socket>>,
}

impl RequestContext {
    pub fn new(header: RequestHeader) -> Self {
        Self {
            header,
            peer_addr: None,
            secure: false,
            url_scheme: "http",
            head: false,
            input: InputBody::empty(),
            socket: None,
            hijack: None,
            after_reply: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn with_peer_addr(mut self, peer_addr: PeerAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }

    /// Marks the request as received over a secured transport.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn path(&self) -> &str {
        self.header.path()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn peer_addr(&self) -> Option<&PeerAddr> {
        self.peer_addr.as_ref()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// `"https"` or `"http"`, decided by the request adapter from the transport-security flag.
    pub fn url_scheme(&self) -> &'static str {
        self.url_scheme
    }

    pub fn is_head(&self) -> bool {
        self.head
    }

    pub fn input(&self) -> &InputBody {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputBody {
        &mut self.input
    }

    /// The raw connection this request arrived on.
    pub fn socket(&self) -> Option<&Arc<dyn Socket>> {
        self.socket.as_ref()
    }

    /// Whether [`hijack`](RequestContext::hijack) is available for this request.
    pub fn can_hijack(&self) -> bool {
        self.hijack.is_some()
    }

    /// Takes the raw connection over.
    ///
    /// The server writes nothing for this request once the application returns; whatever the
    /// application returns is ignored. Every call hands out the same connection.
    pub fn hijack(&mut self) -> Option<Arc<dyn Socket>> {
        let hijack = self.hijack.as_mut()?;
        hijack.hijacked = true;
        let io = hijack.io.get_or_insert_with(|| Arc::clone(&hijack.socket));
        Some(Arc::clone(io))
    }

    pub fn is_hijacked(&self) -> bool {
        self.hijack.as_ref().is_some_and(|hijack| hijack.hijacked)
    }

    pub fn hijacked_io(&self) -> Option<&Arc<dyn Socket>> {
        self.hijack.as_ref().and_then(|hijack| hijack.io.as_ref())
    }

    /// Queues `f` to run after the response is complete, whatever its outcome.
    pub fn after_reply<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.after_reply.push(Box::new(f));
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn publish_socket(&mut self, socket: Arc<dyn Socket>) {
        self.socket = Some(socket);
    }

    pub(crate) fn install_hijack(&mut self, socket: Arc<dyn Socket>) {
        self.hijack = Some(Hijack { socket, hijacked: false, io: None });
    }

    pub(crate) fn attach_input(&mut self, input: InputBody) {
        self.input = input;
    }

    pub(crate) fn mark_head(&mut self, head: bool) {
        self.head = head;
    }

    pub(crate) fn resolve_url_scheme(&mut self) {
        self.url_scheme = if self.secure { "https" } else { "http" };
    }

    pub(crate) fn reset_after_reply(&mut self) {
        self.after_reply.clear();
    }

    /// Runs queued callbacks in registration order, draining the queue.
    pub(crate) fn run_after_reply(&mut self) {
        for callback in self.after_reply.drain(..) {
            callback();
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("header", &self.header)
            .field("peer_addr", &self.peer_addr)
            .field("url_scheme", &self.url_scheme)
            .field("input", &self.input)
            .field("hijacked", &self.is_hijacked())
            .field("after_reply", &self.after_reply.len())
            .finish_non_exhaustive()
    }
}
