//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Result type often returned from methods that can have hearth `Error`s.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while reading, parsing, or writing HTTP/1.x messages.
///
/// The wire-parse variants map to a `400 Bad Request` at the connection
/// level; everything else is either an I/O failure or a problem in the
/// embedding application. See [`Error::is_parse`].
#[derive(Debug)]
pub enum Error {
    /// The request line was empty or did not split into method, target
    /// and version.
    InvalidRequestLine(String),
    /// The request line did not fit in `limit_request_line` bytes.
    LimitRequestLine,
    /// The method failed the token grammar or the conventional-method
    /// restrictions.
    InvalidRequestMethod(String),
    /// The version token did not match `HTTP/<major>.<minor>`, or the
    /// version is outside `[1.0, 2.0)`.
    InvalidHttpVersion(String),
    /// A header line was malformed, or a framing header combination is
    /// unacceptable (duplicate or conflicting Content-Length,
    /// Transfer-Encoding under HTTP/1.0, hop-by-hop extension, ...).
    /// Carries the offending header name or line.
    InvalidHeader(String),
    /// A header field name failed the token grammar.
    InvalidHeaderName(String),
    /// Too many header lines, or one header line too large.
    LimitRequestHeaders(&'static str),
    /// The peer went away in the middle of a header block.
    NoMoreData,
    /// A chunk-size line was not hexadecimal. Carries the raw size bytes.
    InvalidChunkSize(Vec<u8>),
    /// A Transfer-Encoding coding outside the registered set.
    UnsupportedTransferCoding(String),
    /// The declared Content-Length disagrees with the body handed to
    /// the response.
    ContentLengthMismatch {
        /// Sum of the body block lengths.
        body: u64,
        /// Value of the Content-Length header already present.
        declared: u64,
    },
    /// Server misconfiguration, e.g. a SCRIPT_NAME prefix the request
    /// path does not carry.
    Config(String),
    /// A failure raised by (or on behalf of) the application callable.
    App(String),
    /// An I/O error on the underlying stream.
    Io(io::Error),
}

impl Error {
    /// Whether this error came out of parsing the request wire format.
    ///
    /// Parse errors are answered with a synthetic 400; the rest with a
    /// 500 (or a plain close when headers already went out).
    pub fn is_parse(&self) -> bool {
        match *self {
            Error::InvalidRequestLine(_)
            | Error::LimitRequestLine
            | Error::InvalidRequestMethod(_)
            | Error::InvalidHttpVersion(_)
            | Error::InvalidHeader(_)
            | Error::InvalidHeaderName(_)
            | Error::LimitRequestHeaders(_)
            | Error::NoMoreData
            | Error::InvalidChunkSize(_)
            | Error::UnsupportedTransferCoding(_) => true,
            _ => false,
        }
    }

    /// Whether this is a transient I/O condition (`WouldBlock`/`EINTR`)
    /// that ends a request sequence cleanly instead of failing it.
    pub fn is_transient_io(&self) -> bool {
        match *self {
            Error::Io(ref e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidRequestLine(ref line) => {
                write!(f, "invalid request line: {:?}", line)
            }
            Error::LimitRequestLine => f.write_str("request line too large"),
            Error::InvalidRequestMethod(ref m) => write!(f, "invalid request method: {:?}", m),
            Error::InvalidHttpVersion(ref v) => write!(f, "invalid HTTP version: {:?}", v),
            Error::InvalidHeader(ref h) => write!(f, "invalid header: {}", h),
            Error::InvalidHeaderName(ref n) => write!(f, "invalid header name: {:?}", n),
            Error::LimitRequestHeaders(reason) => f.write_str(reason),
            Error::NoMoreData => f.write_str("no more data"),
            Error::InvalidChunkSize(ref raw) => {
                write!(f, "invalid chunk size: {:?}", String::from_utf8_lossy(raw))
            }
            Error::UnsupportedTransferCoding(ref c) => {
                write!(f, "unsupported transfer coding: {}", c)
            }
            Error::ContentLengthMismatch { body, declared } => write!(
                f,
                "Content-Length is wrong: expected {}, got {}",
                body, declared
            ),
            Error::Config(ref msg) => write!(f, "configuration problem: {}", msg),
            Error::App(ref msg) => f.write_str(msg),
            Error::Io(ref e) => write!(f, "io error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}
