//! The request parser.
//!
//! [`RequestParser::parse`] turns a buffered byte stream into a lazy
//! sequence of well-formed requests. Each request is fully decoded
//! (head and body) before it is yielded, so consumers own it outright;
//! the sequence ends at EOF, on `Connection: close` semantics, after a
//! wire error, or silently on a transient non-blocking condition.

use std::io::Read;

use log::debug;

use crate::body::RequestBody;
use crate::buffer::SocketReader;
use crate::config::MessageConfig;
use crate::error::{Error, Result};
use crate::headers::{is_token, latin1_to_string};
use crate::request::{Request, RequestHead};
use crate::uri::{split_request_uri, RequestTarget};
use crate::version::{HttpVersion, HTTP_11};

const CRLF: &[u8] = b"\r\n";

/// Whether the connection must close after a request with these
/// properties, per the HTTP/1.x persistence rules:
///
/// | version | `close` | `keep-alive` | neither |
/// |---------|---------|--------------|---------|
/// | < 1.1   | close   | keep         | close   |
/// | >= 1.1  | close   | keep         | keep    |
pub fn should_close(version: HttpVersion, headers: &[(String, String)]) -> bool {
    let connection = |value: &str| {
        headers.iter().any(|(n, v)| {
            n.eq_ignore_ascii_case("connection") && v.eq_ignore_ascii_case(value)
        })
    };
    if version < HTTP_11 {
        !connection("keep-alive")
    } else {
        connection("close")
    }
}

/// Parses requests off a [`SocketReader`] under configured limits.
#[derive(Debug)]
pub struct RequestParser<R> {
    cfg: MessageConfig,
    reader: SocketReader<R>,
}

impl<R: Read> RequestParser<R> {
    /// Builds a parser over `reader` with the limits in `cfg`.
    pub fn new(cfg: MessageConfig, reader: SocketReader<R>) -> RequestParser<R> {
        RequestParser { cfg, reader }
    }

    /// The lazy request sequence for this connection.
    pub fn parse(&mut self) -> Requests<'_, R> {
        Requests {
            parser: self,
            done: false,
        }
    }

    /// Unwraps the parser, returning the underlying reader.
    pub fn into_reader(self) -> SocketReader<R> {
        self.reader
    }

    fn parse_one(&mut self) -> Result<Request> {
        let (method, target, version) = self.parse_request_line()?;
        let headers = self.parse_headers()?;
        let body = RequestBody::create(version, &headers, &mut self.reader)?;
        let trailers = body.trailers().to_vec();
        debug!("request line: {} {} {}", method, target.path, version);
        Ok(Request {
            head: RequestHead {
                method,
                path: target.path,
                query: target.query,
                fragment: target.fragment,
                version,
                headers,
            },
            body,
            trailers,
        })
    }

    fn parse_request_line(&mut self) -> Result<(String, RequestTarget, HttpVersion)> {
        let line = self
            .reader
            .read_until(CRLF, Some(self.cfg.limit_request_line))?;
        if line.is_empty() {
            return Err(Error::InvalidRequestLine(String::new()));
        }
        let decoded = latin1_to_string(&line);
        if !decoded.ends_with("\r\n") {
            return Err(Error::LimitRequestLine);
        }
        let decoded = decoded.trim_end_matches("\r\n");

        let mut tokens = decoded.split(' ');
        let (method, uri, version) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(m), Some(u), Some(v)) if tokens.next().is_none() => (m, u, v),
            _ => return Err(Error::InvalidRequestLine(decoded.to_owned())),
        };

        if !self.cfg.permit_unconventional_http_method {
            if method.bytes().any(|b| b.is_ascii_lowercase() || b == b'#') {
                return Err(Error::InvalidRequestMethod(method.to_owned()));
            }
            if method.len() < 3 || method.len() > 20 {
                return Err(Error::InvalidRequestMethod(method.to_owned()));
            }
        }
        if !is_token(method) {
            return Err(Error::InvalidRequestMethod(method.to_owned()));
        }

        if uri.is_empty() {
            return Err(Error::InvalidRequestLine(decoded.to_owned()));
        }
        let target = split_request_uri(uri);

        let version = self.parse_version(version)?;

        Ok((method.to_owned(), target, version))
    }

    /// Matches `HTTP/<digits>.<digits>` at the start of the token, the
    /// remainder ignored, then applies the conventional-range check.
    fn parse_version(&self, token: &str) -> Result<HttpVersion> {
        let bad = || Error::InvalidHttpVersion(token.to_owned());
        let rest = token.strip_prefix("HTTP/").ok_or_else(bad)?.as_bytes();

        let major_end = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if major_end == 0 || rest.get(major_end) != Some(&b'.') {
            return Err(bad());
        }
        let minor = &rest[major_end + 1..];
        let minor_end = minor.iter().take_while(|b| b.is_ascii_digit()).count();
        if minor_end == 0 {
            return Err(bad());
        }

        let major = latin1_to_string(&rest[..major_end])
            .parse::<u16>()
            .map_err(|_| bad())?;
        let minor = latin1_to_string(&minor[..minor_end])
            .parse::<u16>()
            .map_err(|_| bad())?;

        let version = HttpVersion::new(major, minor);
        if !version.is_conventional() && !self.cfg.permit_unconventional_http_version {
            return Err(bad());
        }
        Ok(version)
    }

    fn parse_headers(&mut self) -> Result<Vec<(String, String)>> {
        let mut headers: Vec<(String, String)> = Vec::new();
        loop {
            if headers.len() > self.cfg.limit_request_fields {
                return Err(Error::LimitRequestHeaders("limit request headers fields"));
            }
            let line = self.reader.read_until(CRLF, None)?;
            if !line.ends_with(CRLF) {
                return Err(Error::NoMoreData);
            }
            if line == CRLF {
                return Ok(headers);
            }
            if line.len() > self.cfg.limit_request_field_size {
                return Err(Error::LimitRequestHeaders("limit request header field size"));
            }
            let decoded = latin1_to_string(&line);
            let trimmed = decoded.trim();
            let (name, value) = trimmed
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(trimmed.to_owned()))?;
            if !is_token(name) {
                return Err(Error::InvalidHeaderName(name.to_owned()));
            }
            let value = value.trim_matches(|c| c == ' ' || c == '\t');
            headers.push((name.to_uppercase(), value.to_owned()));
        }
    }
}

/// Iterator over the pipelined requests of one connection.
///
/// Yields `Err` once on the first wire failure, then fuses. Transient
/// non-blocking conditions (`WouldBlock`, `EINTR`) terminate iteration
/// cleanly without an error.
#[derive(Debug)]
pub struct Requests<'a, R> {
    parser: &'a mut RequestParser<R>,
    done: bool,
}

impl<'a, R: Read> Iterator for Requests<'a, R> {
    type Item = Result<Request>;

    fn next(&mut self) -> Option<Result<Request>> {
        if self.done {
            return None;
        }
        // Peek one byte to tell keep-alive data from a closed peer.
        match self.parser.reader.read(Some(1)) {
            Ok(ref peeked) if peeked.is_empty() => {
                self.done = true;
                return None;
            }
            Ok(_) => self.parser.reader.unread(1),
            Err(e) => {
                self.done = true;
                let e = Error::from(e);
                if e.is_transient_io() {
                    return None;
                }
                return Some(Err(e));
            }
        }
        match self.parser.parse_one() {
            Ok(request) => {
                if should_close(request.head.version, &request.head.headers) {
                    self.done = true;
                }
                Some(Ok(request))
            }
            Err(e) => {
                self.done = true;
                if e.is_transient_io() {
                    None
                } else {
                    Some(Err(e))
                }
            }
        }
    }
}
