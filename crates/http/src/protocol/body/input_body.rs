use bytes::Bytes;
use std::io;

/// The request payload handed to the application.
///
/// Reads after [`close`](InputBody::close) fail, the buffered bytes stay reachable through
/// [`as_bytes`](InputBody::as_bytes).
#[derive(Debug, Default)]
pub struct InputBody {
    data: Bytes,
    position: usize,
    closed: bool,
}

impl InputBody {
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0, closed: false }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The whole payload, independent of how much has been read.
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes not consumed by `read` yet.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl io::Read for InputBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("input body already closed"));
        }
        let unread = &self.data[self.position..];
        let len = unread.len().min(buf.len());
        buf[..len].copy_from_slice(&unread[..len]);
        self.position += len;
        Ok(len)
    }
}
