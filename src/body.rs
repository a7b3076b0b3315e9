//! Request bodies and their framing.
//!
//! A request body is framed one of three ways: by `Content-Length`, by
//! `Transfer-Encoding: chunked`, or by nothing at all. Each gets its own
//! reader variant; selection happens in [`RequestBody::create`] from the
//! parsed header block, including the request-smuggling guards.
//!
//! Bodies are decoded into memory at selection time, so a yielded
//! [`crate::Request`] owns its payload outright and the socket reader is
//! immediately free for the next pipelined request.

use std::io::Read;

use bytes::{Bytes, BytesMut};
use log::trace;

use crate::buffer::SocketReader;
use crate::error::{Error, Result};
use crate::headers::latin1_to_string;
use crate::version::{HttpVersion, HTTP_11};

const CRLF: &[u8] = b"\r\n";
const DOUBLE_CRLF: &[u8] = b"\r\n\r\n";

/// Transfer codings this server recognizes on `Transfer-Encoding`.
/// Only `identity` and `chunked` are actually decoded.
const KNOWN_CODINGS: [&str; 5] = ["identity", "chunked", "compress", "deflate", "gzip"];

/// A decoded body, tagged by the framing that produced it.
#[derive(Debug)]
pub enum BodyReader {
    /// Framed by `Content-Length`.
    Length {
        /// The buffered payload.
        buf: Bytes,
        /// Bytes the declared length still allows to be handed out.
        remaining: usize,
    },
    /// Framed by `Transfer-Encoding: chunked`; payload is the chunk
    /// concatenation.
    Chunked {
        /// The buffered payload.
        buf: Bytes,
        /// Trailer fields from the terminating chunk, `(NAME, value)`.
        trailers: Vec<(String, String)>,
    },
    /// No framing headers; content ran to a sentinel (or was empty).
    Eof {
        /// The buffered payload.
        buf: Bytes,
    },
}

impl BodyReader {
    /// A reader that yields nothing.
    pub fn empty() -> BodyReader {
        BodyReader::Eof { buf: Bytes::new() }
    }

    /// Pulls exactly `length` bytes of payload off the socket, then
    /// consumes a trailing `\r\n\r\n` sentinel when one is literally
    /// next (unreading whatever the scan swallowed when it is not).
    pub fn parse_length<R: Read>(
        reader: &mut SocketReader<R>,
        length: usize,
    ) -> Result<BodyReader> {
        let buf = read_exact(reader, length)?;
        let tail = reader.read_until(DOUBLE_CRLF, None)?;
        if tail != DOUBLE_CRLF {
            reader.unread(tail.len());
        }
        Ok(BodyReader::Length {
            buf: buf.freeze(),
            remaining: length,
        })
    }

    /// Runs the chunk decoder to the terminating zero chunk,
    /// concatenating payloads and capturing trailers.
    pub fn parse_chunked<R: Read>(reader: &mut SocketReader<R>) -> Result<BodyReader> {
        let mut buf = BytesMut::new();
        let mut trailers = Vec::new();
        for chunk in Chunks::new(reader) {
            let chunk = chunk?;
            trace!("chunk: size={}", chunk.size);
            if chunk.is_last() {
                trailers = chunk.trailers;
                break;
            }
            buf.extend_from_slice(&chunk.data);
        }
        Ok(BodyReader::Chunked {
            buf: buf.freeze(),
            trailers,
        })
    }

    /// Reads close-delimited content up to a `\r\n\r\n` sentinel (or
    /// EOF), the sentinel excluded from the payload.
    pub fn parse_eof<R: Read>(reader: &mut SocketReader<R>) -> Result<BodyReader> {
        let mut data = reader.read_until(DOUBLE_CRLF, None)?;
        if data.ends_with(DOUBLE_CRLF) {
            data.truncate(data.len() - DOUBLE_CRLF.len());
        }
        Ok(BodyReader::Eof {
            buf: Bytes::from(data),
        })
    }

    /// Trailer fields, non-empty only for chunked bodies that had them.
    pub fn trailers(&self) -> &[(String, String)] {
        match *self {
            BodyReader::Chunked { ref trailers, .. } => trailers,
            _ => &[],
        }
    }

    /// The bytes still readable.
    fn peek(&self) -> &[u8] {
        match *self {
            BodyReader::Length {
                ref buf, remaining, ..
            } => {
                let n = remaining.min(buf.len());
                &buf[..n]
            }
            BodyReader::Chunked { ref buf, .. } | BodyReader::Eof { ref buf } => buf,
        }
    }

    /// Consumes `n` bytes; `n` must not exceed `peek().len()`.
    fn consume(&mut self, n: usize) -> Bytes {
        match *self {
            BodyReader::Length {
                ref mut buf,
                ref mut remaining,
            } => {
                *remaining -= n;
                buf.split_to(n)
            }
            BodyReader::Chunked { ref mut buf, .. } | BodyReader::Eof { ref mut buf } => {
                buf.split_to(n)
            }
        }
    }

    /// Returns up to `size` bytes; empty forever once exhausted.
    pub fn read(&mut self, size: usize) -> Bytes {
        let n = size.min(self.peek().len());
        if n == 0 {
            return Bytes::new();
        }
        self.consume(n)
    }
}

/// One decoded chunk of a chunked body.
#[derive(Debug)]
pub struct Chunk {
    /// The payload (empty for the terminating chunk).
    pub data: Bytes,
    /// The declared size, parsed from the hexadecimal size line.
    pub size: usize,
    /// Trailer fields; populated only on the terminating chunk.
    pub trailers: Vec<(String, String)>,
}

impl Chunk {
    /// Whether this is the zero-size terminator.
    pub fn is_last(&self) -> bool {
        self.size == 0
    }
}

/// Iterator over the chunks of a chunked body, terminating after the
/// zero chunk (or the first framing error).
pub struct Chunks<'a, R> {
    reader: &'a mut SocketReader<R>,
    done: bool,
}

impl<'a, R: Read> Chunks<'a, R> {
    /// Starts decoding chunks off `reader`.
    pub fn new(reader: &'a mut SocketReader<R>) -> Chunks<'a, R> {
        Chunks {
            reader,
            done: false,
        }
    }

    fn parse_chunk(&mut self) -> Result<Chunk> {
        let mut line = self.reader.read_until(CRLF, None)?;
        if line.ends_with(CRLF) {
            line.truncate(line.len() - CRLF.len());
        }
        // Chunk extensions after ';' are parsed off and dropped.
        let size_bytes = match line.iter().position(|&b| b == b';') {
            Some(i) => &line[..i],
            None => &line[..],
        };
        if size_bytes.is_empty() || !size_bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::InvalidChunkSize(size_bytes.to_vec()));
        }
        let size_text = latin1_to_string(size_bytes);
        let size = usize::from_str_radix(&size_text, 16)
            .map_err(|_| Error::InvalidChunkSize(size_bytes.to_vec()))?;

        if size == 0 {
            return Ok(Chunk {
                data: Bytes::new(),
                size: 0,
                trailers: self.parse_trailers()?,
            });
        }

        let data = read_exact(self.reader, size)?;
        if data.len() != size {
            return Err(Error::InvalidHeader(format!(
                "chunk size {} does not match payload length {}",
                size,
                data.len()
            )));
        }
        let terminator = read_exact(self.reader, 2)?;
        if terminator[..] != *CRLF {
            return Err(Error::InvalidHeader(format!(
                "chunk of size {} not terminated by CRLF",
                size
            )));
        }
        Ok(Chunk {
            data: data.freeze(),
            size,
            trailers: Vec::new(),
        })
    }

    fn parse_trailers(&mut self) -> Result<Vec<(String, String)>> {
        let mut trailers = Vec::new();
        loop {
            let line = self.reader.read_until(CRLF, None)?;
            if line == CRLF || line.is_empty() {
                return Ok(trailers);
            }
            let text = latin1_to_string(&line);
            let text = text.trim_end_matches("\r\n");
            let (name, value) = match text.split_once(':') {
                Some(pair) => pair,
                None => return Err(Error::InvalidHeader(text.to_owned())),
            };
            trailers.push((name.trim().to_uppercase(), value.trim().to_owned()));
        }
    }
}

impl<'a, R: Read> Iterator for Chunks<'a, R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Result<Chunk>> {
        if self.done {
            return None;
        }
        let item = self.parse_chunk();
        if let Ok(ref chunk) = item {
            self.done = chunk.is_last();
        } else {
            self.done = true;
        }
        Some(item)
    }
}

/// Pulls up to `length` bytes off the reader, stopping early at EOF.
fn read_exact<R: Read>(reader: &mut SocketReader<R>, length: usize) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(length.min(64 * 1024));
    let mut want = length;
    while want > 0 {
        let data = reader.read(Some(want))?;
        if data.is_empty() {
            break;
        }
        want -= data.len();
        buf.extend_from_slice(&data);
    }
    Ok(buf)
}

/// The application-facing request body stream.
///
/// Wraps a [`BodyReader`] with POSIX-flavoured read semantics: `read`
/// with no size drains, `readline` stops after a newline, `readlines`
/// aggregates with an optional cumulative byte hint.
#[derive(Debug)]
pub struct RequestBody {
    reader: BodyReader,
}

impl RequestBody {
    /// Wraps an already-built reader.
    pub fn new(reader: BodyReader) -> RequestBody {
        RequestBody { reader }
    }

    /// A body that yields nothing.
    pub fn empty() -> RequestBody {
        RequestBody::new(BodyReader::empty())
    }

    /// Selects the framing from `(version, headers)` and decodes the
    /// body off the socket.
    ///
    /// The dangerous combinations are refused here: a repeated or
    /// non-numeric `Content-Length`, chunked together with a
    /// `Content-Length` (smuggling guard), and chunked under HTTP/1.0
    /// (framing wonky, RFC 9112 §6.1).
    pub fn create<R: Read>(
        version: HttpVersion,
        headers: &[(String, String)],
        reader: &mut SocketReader<R>,
    ) -> Result<RequestBody> {
        let mut content_length: Option<usize> = None;
        let mut chunked = false;

        for (name, value) in headers {
            if name.eq_ignore_ascii_case("CONTENT-LENGTH") {
                if content_length.is_some() {
                    return Err(Error::InvalidHeader("CONTENT-LENGTH".into()));
                }
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::InvalidHeader("CONTENT-LENGTH".into()));
                }
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidHeader("CONTENT-LENGTH".into()))?;
                content_length = Some(parsed);
            } else if name.eq_ignore_ascii_case("TRANSFER-ENCODING") {
                let codings: Vec<String> = value
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .collect();
                if !codings
                    .iter()
                    .all(|c| KNOWN_CODINGS.contains(&c.as_str()))
                {
                    return Err(Error::UnsupportedTransferCoding(value.clone()));
                }
                if codings.iter().any(|c| c != "identity" && c != "chunked") {
                    // Recognized but not decoded by this server.
                    return Err(Error::InvalidHeader("TRANSFER-ENCODING".into()));
                }
                if codings.last().map(String::as_str) == Some("chunked") {
                    chunked = true;
                }
            }
        }

        let reader = if chunked {
            if version < HTTP_11 {
                return Err(Error::InvalidHeader("TRANSFER-ENCODING".into()));
            }
            if content_length.is_some() {
                // The framing we understood may not be the framing a
                // proxy understood; remaining input must not be trusted.
                return Err(Error::InvalidHeader("CONTENT-LENGTH".into()));
            }
            BodyReader::parse_chunked(reader)?
        } else if let Some(length) = content_length {
            BodyReader::parse_length(reader, length)?
        } else {
            BodyReader::empty()
        };
        Ok(RequestBody::new(reader))
    }

    /// The underlying tagged reader.
    pub fn reader(&self) -> &BodyReader {
        &self.reader
    }

    /// Trailers captured with the body, if it was chunked.
    pub fn trailers(&self) -> &[(String, String)] {
        self.reader.trailers()
    }

    /// Reads up to `size` bytes; `None` drains the body.
    pub fn read(&mut self, size: Option<usize>) -> Bytes {
        self.reader.read(size.unwrap_or(usize::MAX))
    }

    /// Reads up to and including the next `\n`, or up to `size` bytes.
    pub fn readline(&mut self, size: Option<usize>) -> Bytes {
        let visible = self.reader.peek();
        let cap = size.unwrap_or(visible.len()).min(visible.len());
        let n = match visible[..cap].iter().position(|&b| b == b'\n') {
            Some(at) => at + 1,
            None => cap,
        };
        if n == 0 {
            return Bytes::new();
        }
        self.reader.consume(n)
    }

    /// Collects lines; with a positive `hint`, stops once the
    /// cumulative byte count reaches it.
    pub fn readlines(&mut self, hint: Option<usize>) -> Vec<Bytes> {
        let mut lines = Vec::new();
        let mut total = 0;
        loop {
            let line = self.readline(None);
            if line.is_empty() {
                return lines;
            }
            total += line.len();
            lines.push(line);
            if let Some(h) = hint {
                if h > 0 && total >= h {
                    return lines;
                }
            }
        }
    }

    /// Iterates the body line by line.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { body: self }
    }
}

/// Line iterator over a [`RequestBody`].
#[derive(Debug)]
pub struct Lines<'a> {
    body: &'a mut RequestBody,
}

impl<'a> Iterator for Lines<'a> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let line = self.body.readline(None);
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}
