//! The application's three-part return value and the result of one request/response cycle.

use crate::protocol::Headers;
use crate::protocol::body::Body;

/// Status value with which an application announces that it answers the request on its own, later.
pub const ASYNC_STATUS: i32 = -1;

/// What an application returns for a request: status, ordered headers and body chunks.
///
/// The status is a plain integer so [`ASYNC_STATUS`] can be expressed; any other value must be a
/// valid HTTP status code.
#[derive(Debug, Default)]
pub struct Response {
    status: i32,
    headers: Headers,
    body: Body,
}

impl Response {
    pub fn new(status: i32, headers: Headers, body: Body) -> Self {
        Self { status, headers, body }
    }

    /// A `200` response with the given body and no headers.
    pub fn ok<B: Into<Body>>(body: B) -> Self {
        Self::new(200, Headers::new(), body.into())
    }

    /// The async marker: status `-1`, no headers, no body.
    pub fn deferred() -> Self {
        Self::new(ASYNC_STATUS, Headers::new(), Body::empty())
    }

    pub fn with_header<V: Into<String>>(mut self, name: &'static str, value: V) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_parts(self) -> (i32, Headers, Body) {
        (self.status, self.headers, self.body)
    }
}

impl From<(i32, Headers, Body)> for Response {
    fn from((status, headers, body): (i32, Headers, Body)) -> Self {
        Self::new(status, headers, body)
    }
}

/// The response state a writer accumulates before the head goes out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    status: u16,
    headers: Headers,
    content_length: Option<u64>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self { status, headers: Headers::new(), content_length: None }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn set_headers(&mut self, headers: Headers) {
        self.headers = headers;
    }

    /// The body length if known; a `Content-Length` header field overrides it when encoded.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, content_length: Option<u64>) {
        self.content_length = content_length;
    }
}

/// How a request/response cycle ended, from the connection owner's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A response was written; the connection may serve another request if `keep_alive` is set.
    Complete { keep_alive: bool },
    /// The application answers later on its own; the connection must be left alone.
    Async,
    /// The application took the raw connection over.
    Hijacked,
}

impl Outcome {
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Outcome::Complete { keep_alive: true })
    }
}
