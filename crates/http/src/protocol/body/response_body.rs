use crate::protocol::BoxError;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;

/// The response payload returned by an application: an ordered sequence of byte chunks.
///
/// A body built from in-memory chunks knows its size up front, which lets the writer announce a
/// `Content-Length` for the single-chunk case. A streamed body is pulled chunk by chunk while it is
/// written. Either kind may carry a close callback that runs once the response cycle ends.
pub struct Body {
    kind: Kind,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

enum Kind {
    Chunks(VecDeque<Bytes>),
    Stream(BoxStream<'static, Result<Bytes, BoxError>>),
}

impl Body {
    pub fn empty() -> Self {
        Self { kind: Kind::Chunks(VecDeque::new()), on_close: None }
    }

    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self { kind: Kind::Chunks(chunks.into_iter().map(Into::into).collect()), on_close: None }
    }

    pub fn from_stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError>,
    {
        let stream = stream.map(|item| item.map(Into::into).map_err(Into::into)).boxed();
        Self { kind: Kind::Stream(stream), on_close: None }
    }

    /// Registers a callback invoked by [`close`](Body::close).
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_close = Some(Box::new(f));
        self
    }

    /// True only for an in-memory body without any chunk; a stream is never known to be empty.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            Kind::Chunks(chunks) => chunks.is_empty(),
            Kind::Stream(_) => false,
        }
    }

    /// The byte length of the body when it consists of exactly one in-memory chunk.
    pub fn single_chunk_len(&self) -> Option<u64> {
        match &self.kind {
            Kind::Chunks(chunks) if chunks.len() == 1 => Some(chunks[0].len() as u64),
            _ => None,
        }
    }

    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, BoxError>> {
        match &mut self.kind {
            Kind::Chunks(chunks) => chunks.pop_front().map(Ok),
            Kind::Stream(stream) => stream.next().await,
        }
    }

    /// Runs the close callback, at most once.
    pub fn close(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Body");
        match &self.kind {
            Kind::Chunks(chunks) => debug.field("chunks", &chunks.len()),
            Kind::Stream(_) => debug.field("stream", &true),
        };
        debug.field("on_close", &self.on_close.is_some()).finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::from_chunks([bytes])
    }
}

impl From<&'static str> for Body {
    fn from(str: &'static str) -> Self {
        Self::from(Bytes::from_static(str.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(slice: &'static [u8]) -> Self {
        Self::from(Bytes::from_static(slice))
    }
}

impl From<String> for Body {
    fn from(string: String) -> Self {
        Self::from(Bytes::from(string))
    }
}

impl From<Vec<u8>> for Body {
    fn from(vec: Vec<u8>) -> Self {
        Self::from(Bytes::from(vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn chunks_in_order() {
        let mut body = Body::from_chunks(["a", "", "bc"]);
        assert!(!body.is_empty());
        assert_eq!(body.single_chunk_len(), None);

        let mut collected = vec![];
        while let Some(chunk) = body.next_chunk().await {
            collected.push(chunk.unwrap());
        }
        assert_eq!(collected, vec![Bytes::from("a"), Bytes::new(), Bytes::from("bc")]);
    }

    #[tokio::test]
    async fn stream_body_has_no_known_size() {
        let stream = futures::stream::iter(vec![Ok::<_, std::io::Error>("x"), Ok("yz")]);
        let mut body = Body::from_stream(stream);
        assert!(!body.is_empty());
        assert_eq!(body.single_chunk_len(), None);
        assert_eq!(body.next_chunk().await.unwrap().unwrap(), "x");
        assert_eq!(body.next_chunk().await.unwrap().unwrap(), "yz");
        assert!(body.next_chunk().await.is_none());
    }

    #[test]
    fn single_chunk_and_close_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let mut body = Body::from("hello").on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(body.single_chunk_len(), Some(5));
        body.close();
        body.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(Body::empty().is_empty());
    }
}
