//! In-memory streams for tests.

use std::cmp;
use std::io::{self, Read, Write};

/// A scripted duplex stream: reads come from a fixed buffer (optionally
/// rationed so the source can turn non-blocking mid-conversation),
/// writes accumulate for inspection.
#[derive(Debug)]
pub struct MockStream {
    data: Vec<u8>,
    pos: usize,
    /// Everything written to the stream so far.
    pub written: Vec<u8>,
    bytes_until_block: Option<usize>,
}

impl MockStream {
    /// A stream that serves `data` and then reports EOF.
    pub fn new(data: Vec<u8>) -> MockStream {
        MockStream {
            data,
            pos: 0,
            written: Vec::new(),
            bytes_until_block: None,
        }
    }

    /// A stream that serves at most `budget` bytes and then fails with
    /// `WouldBlock`, like a drained non-blocking socket.
    pub fn with_block_budget(data: Vec<u8>, budget: usize) -> MockStream {
        MockStream {
            data,
            pos: 0,
            written: Vec::new(),
            bytes_until_block: Some(budget),
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let cap = match self.bytes_until_block {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(budget) => cmp::min(budget, buf.len()),
            None => buf.len(),
        };
        let n = cmp::min(cap, self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if let Some(ref mut budget) = self.bytes_until_block {
            *budget -= n;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MockStream;
    use std::io::Read;

    #[test]
    fn blocks_after_budget() {
        let mut stream = MockStream::with_block_budget(b"abcdef".to_vec(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert!(stream.read(&mut buf).is_err());
    }
}
