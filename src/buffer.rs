//! The buffered socket reader.
//!
//! All input I/O flows through [`SocketReader`]: the parser and the body
//! readers are pure transforms over what it buffers. It keeps a growable
//! scratch buffer and a monotonic cursor, which is what makes cheap
//! look-ahead (`unread`) and bounded delimiter scans (`read_until`)
//! possible on a plain byte stream.

use std::cmp;
use std::io::{self, Read};

use log::trace;

/// Default cap on a single fetch from the underlying stream, in bytes.
pub const DEFAULT_MAX_CHUNK: usize = 8192;

/// A buffered reader over a byte source with look-ahead and rewind.
#[derive(Debug)]
pub struct SocketReader<R> {
    inner: R,
    buf: Vec<u8>,
    cursor: usize,
    max_chunk: usize,
}

impl<R: Read> SocketReader<R> {
    /// Wraps a byte source with the default chunk cap.
    pub fn new(inner: R) -> SocketReader<R> {
        SocketReader::with_max_chunk(inner, DEFAULT_MAX_CHUNK)
    }

    /// Wraps a byte source, fetching at most `max_chunk` bytes per pull.
    pub fn with_max_chunk(inner: R, max_chunk: usize) -> SocketReader<R> {
        assert!(max_chunk > 0, "max_chunk must be non-zero");
        SocketReader {
            inner,
            buf: Vec::with_capacity(max_chunk),
            cursor: 0,
            max_chunk,
        }
    }

    /// The configured per-pull cap.
    #[inline]
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Gets a reference to the underlying source.
    #[inline]
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwraps this reader, discarding any buffered bytes.
    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Pulls one chunk (at most `max_chunk` bytes) from the source into
    /// the scratch buffer and returns the newly arrived bytes. Empty on
    /// EOF.
    pub fn chunk(&mut self) -> io::Result<&[u8]> {
        let start = self.buf.len();
        self.buf.resize(start + self.max_chunk, 0);
        let nread = match self.inner.read(&mut self.buf[start..]) {
            Ok(n) => n,
            Err(e) => {
                self.buf.truncate(start);
                return Err(e);
            }
        };
        self.buf.truncate(start + nread);
        trace!("chunk: {} bytes", nread);
        Ok(&self.buf[start..])
    }

    /// Reads up to `size` bytes (`None` means `max_chunk`), fetching one
    /// chunk from the source if nothing is buffered past the cursor.
    pub fn read(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        let size = size.unwrap_or(self.max_chunk);
        if self.cursor == self.buf.len() {
            self.chunk()?;
        }
        let end = cmp::min(self.buf.len(), self.cursor + size);
        let data = self.buf[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(data)
    }

    /// Rewinds the cursor by `size` bytes, clamped at the start of the
    /// scratch buffer.
    pub fn unread(&mut self, size: usize) {
        self.cursor = self.cursor.saturating_sub(size);
    }

    /// Reads bytes up to and including the first occurrence of `delim`.
    ///
    /// When `limit` is set the scan is confined to the first `limit`
    /// bytes past the cursor; if the delimiter is not inside them,
    /// exactly `limit` bytes come back. On EOF whatever is buffered
    /// comes back, delimiter or not. Callers tell the cases apart by
    /// looking at the tail of the returned bytes.
    ///
    /// # Panics
    ///
    /// Panics when `delim` is empty; there is nothing to search for.
    pub fn read_until(&mut self, delim: &[u8], limit: Option<usize>) -> io::Result<Vec<u8>> {
        assert!(!delim.is_empty(), "read_until delimiter must be non-empty");
        loop {
            let available = self.buf.len() - self.cursor;
            let scan = match limit {
                Some(l) => cmp::min(l, available),
                None => available,
            };
            let window = &self.buf[self.cursor..self.cursor + scan];
            if let Some(at) = find(window, delim) {
                let end = at + delim.len();
                let data = self.buf[self.cursor..self.cursor + end].to_vec();
                self.cursor += end;
                return Ok(data);
            }
            if let Some(l) = limit {
                if available >= l {
                    let data = self.buf[self.cursor..self.cursor + l].to_vec();
                    self.cursor += l;
                    return Ok(data);
                }
            }
            if self.chunk()?.is_empty() {
                let data = self.buf[self.cursor..].to_vec();
                self.cursor = self.buf.len();
                return Ok(data);
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::SocketReader;
    use std::io::Cursor;

    fn reader(data: &[u8], max_chunk: usize) -> SocketReader<Cursor<Vec<u8>>> {
        SocketReader::with_max_chunk(Cursor::new(data.to_vec()), max_chunk)
    }

    #[test]
    fn chunk_respects_cap() {
        let mut r = reader(b"Lorem ipsum dolor", 5);
        assert_eq!(r.chunk().unwrap(), b"Lorem");
        assert_eq!(r.chunk().unwrap(), b" ipsu");
        assert_eq!(r.chunk().unwrap(), b"m dol");
        assert_eq!(r.chunk().unwrap(), b"or");
        assert_eq!(r.chunk().unwrap(), b"");
    }

    #[test]
    fn read_default_size_is_max_chunk() {
        let mut r = reader(b"qwerty123456", 5);
        assert_eq!(r.read(None).unwrap(), b"qwert");
        assert_eq!(r.read(None).unwrap(), b"y1234");
        assert_eq!(r.read(None).unwrap(), b"56");
        assert_eq!(r.read(None).unwrap(), b"");
    }

    #[test]
    fn read_zero() {
        let mut r = reader(b"qwertyasdfgh", 8192);
        assert_eq!(r.read(Some(0)).unwrap(), b"");
    }

    #[test]
    fn read_fixed_sizes() {
        let mut r = reader(b"qwertyasdfghzxcvbn123456", 8192);
        assert_eq!(r.read(Some(5)).unwrap(), b"qwert");
        assert_eq!(r.read(Some(5)).unwrap(), b"yasdf");
        assert_eq!(r.read(Some(5)).unwrap(), b"ghzxc");
        assert_eq!(r.read(Some(5)).unwrap(), b"vbn12");
        assert_eq!(r.read(Some(5)).unwrap(), b"3456");
        assert_eq!(r.read(Some(5)).unwrap(), b"");
    }

    #[test]
    fn unread_rewinds() {
        let mut r = reader(b"qwertyasdfgh", 8192);
        r.read(Some(5)).unwrap();
        r.unread(5);
        assert_eq!(r.read(None).unwrap(), b"qwertyasdfgh");
    }

    #[test]
    fn unread_clamps_at_zero() {
        let mut r = reader(b"abc", 8192);
        r.read(Some(2)).unwrap();
        r.unread(100);
        assert_eq!(r.read(None).unwrap(), b"abc");
    }

    #[test]
    fn unread_partial_replay() {
        // read(n); unread(k); read(k) replays the last k bytes.
        let mut r = reader(b"hello world", 8192);
        let first = r.read(Some(8)).unwrap();
        r.unread(3);
        assert_eq!(r.read(Some(3)).unwrap(), &first[5..]);
    }

    #[test]
    fn read_until_finds_delimiter() {
        let mut r = reader(b"Hello, World!\r\n\r\n", 8192);
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b"Hello, World!\r\n\r\n");
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b"");
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b"");
    }

    #[test]
    fn read_until_eof_without_delimiter() {
        let mut r = reader(b"Hello, World!", 8192);
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b"Hello, World!");
    }

    #[test]
    fn read_until_empty_source() {
        let mut r = reader(b"", 8192);
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b"");
    }

    #[test]
    fn read_until_line_by_line() {
        for max_chunk in &[3usize, 8192] {
            let mut r = reader(b"Hello, \r\nWorld!\r\n\r\n", *max_chunk);
            assert_eq!(r.read_until(b"\r\n", None).unwrap(), b"Hello, \r\n");
            assert_eq!(r.read_until(b"\r\n", None).unwrap(), b"World!\r\n");
            assert_eq!(r.read_until(b"\r\n", None).unwrap(), b"\r\n");
        }
    }

    #[test]
    fn read_until_limit_truncates() {
        let mut r = reader(b"Hello, World!\r\n\r\n", 5);
        assert_eq!(r.read_until(b"\r\n\r\n", Some(5)).unwrap(), b"Hello");
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b", World!\r\n\r\n");
        assert_eq!(r.read_until(b"\r\n\r\n", None).unwrap(), b"");
    }

    #[test]
    fn read_until_match_wins_over_limit() {
        let mut r = reader(b"ab\r\nrest", 8192);
        assert_eq!(r.read_until(b"\r\n", Some(4)).unwrap(), b"ab\r\n");
        assert_eq!(r.read(None).unwrap(), b"rest");
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn read_until_empty_delimiter_panics() {
        let mut r = reader(b"abc", 8192);
        let _ = r.read_until(b"", None);
    }
}
