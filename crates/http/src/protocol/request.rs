//! Wraps `http::Request<()>` with the few request facts the response side needs to negotiate
//! framing and keep-alive.

use http::header::CONNECTION;
use http::{HeaderMap, Method, Request, Uri, Version};

/// A parsed request head.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

/// What the client asked for in its `Connection` header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionToken {
    Close,
    KeepAlive,
    /// header absent, or carrying neither `close` nor `keep-alive`
    Unspecified,
}

impl RequestHeader {
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// The request target without its query.
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn is_head(&self) -> bool {
        self.method() == Method::HEAD
    }

    /// Scans every `Connection` header for the `close` / `keep-alive` tokens, `close` wins.
    pub fn connection(&self) -> ConnectionToken {
        let mut token = ConnectionToken::Unspecified;
        let values = self.headers().get_all(CONNECTION).iter().filter_map(|value| value.to_str().ok());
        for item in values.flat_map(|value| value.split(',')).map(str::trim) {
            if item.eq_ignore_ascii_case("close") {
                return ConnectionToken::Close;
            }
            if item.eq_ignore_ascii_case("keep-alive") {
                token = ConnectionToken::KeepAlive;
            }
        }
        token
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
