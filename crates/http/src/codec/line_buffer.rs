use bytes::{BufMut, BytesMut};

/// Initial buffer size allocated for a response head
const INIT_LINE_BUFFER_SIZE: usize = 4 * 1024;

/// Append-only byte accumulator.
///
/// The whole status line and header block is assembled here so it reaches the socket with a
/// single write.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INIT_LINE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    #[inline]
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Appends every part in order.
    #[inline]
    pub fn append(&mut self, parts: &[&[u8]]) {
        for part in parts {
            self.buf.put_slice(part);
        }
    }

    #[inline]
    pub fn push_decimal(&mut self, n: u64) {
        put_decimal(&mut self.buf, n);
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Forgets the content, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[inline]
    pub(crate) fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `n` as ASCII decimal digits.
pub(crate) fn put_decimal(dst: &mut BytesMut, mut n: u64) {
    let mut digits = [0u8; 20];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&digits[start..]);
}

/// Writes `n` as lowercase ASCII hexadecimal digits.
pub(crate) fn put_hex(dst: &mut BytesMut, mut n: u64) {
    const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut digits = [0u8; 16];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = HEX_DIGITS[(n & 0xf) as usize];
        n >>= 4;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&digits[start..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_parts() {
        let mut lines = LineBuffer::new();
        lines.push(b"HTTP/1.1 ");
        lines.push_decimal(404);
        lines.append(&[b" ", b"Not Found", b"\r\n"]);
        assert_eq!(lines.as_bytes(), b"HTTP/1.1 404 Not Found\r\n");

        lines.clear();
        assert!(lines.is_empty());
    }

    #[test]
    fn number_formatting() {
        let mut buf = BytesMut::new();
        put_decimal(&mut buf, 0);
        buf.put_u8(b' ');
        put_decimal(&mut buf, u64::MAX);
        buf.put_u8(b' ');
        put_hex(&mut buf, 0);
        buf.put_u8(b' ');
        put_hex(&mut buf, 4096);
        buf.put_u8(b' ');
        put_hex(&mut buf, 0xbeef);
        assert_eq!(&buf[..], b"0 18446744073709551615 0 1000 beef");
    }
}
