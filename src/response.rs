//! Server responses.
//!
//! A [`Response`] moves through a strict lifecycle:
//!
//! ```notrust
//! DRAFT --set_status--> STATUS_SET --extend_headers*--> STATUS_SET
//! STATUS_SET --set_body--> READY --headers_data--> READY --body_stream--> DONE
//! ```
//!
//! Out-of-order transitions (a second `set_status`, serializing before a
//! body is set) are bugs in the caller, not wire conditions, and panic.

use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;
use httpdate::fmt_http_date;

use crate::error::{Error, Result};
use crate::headers::{is_hop_by_hop, string_to_latin1, title_case};
use crate::request::RequestHead;
use crate::version::{HttpVersion, HTTP_10, HTTP_11};

/// The product token advertised in the `Server` header.
pub const SERVER: &str = concat!("hearth/", env!("CARGO_PKG_VERSION"));

/// An outgoing response under construction.
#[derive(Debug)]
pub struct Response {
    version: HttpVersion,
    status: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Vec<Bytes>>,
}

impl Response {
    /// Drafts a response for `request`: protocol version inherited,
    /// `Date` and `Server` stamped, and the connection disposition
    /// computed — `close` when the request asked for it, spoke 1.0, or
    /// carried both framing headers; `upgrade` (with the `Upgrade`
    /// header mirrored) when the request negotiated a switch;
    /// `keep-alive` otherwise.
    pub fn draft(request: &RequestHead) -> Response {
        let mut headers = vec![
            ("Date".to_owned(), fmt_http_date(SystemTime::now())),
            ("Server".to_owned(), SERVER.to_owned()),
        ];
        let must_close = request.has_connection_close_header()
            || request.version == HTTP_10
            || request.has_transfer_encoding_and_content_length_headers();
        let disposition = if must_close {
            "close"
        } else if let Some((_, protocol)) = request.upgrade_header() {
            headers.push(("Upgrade".to_owned(), protocol));
            "upgrade"
        } else {
            "keep-alive"
        };
        headers.push(("Connection".to_owned(), disposition.to_owned()));
        Response {
            version: request.version,
            status: None,
            headers,
            body: None,
        }
    }

    /// Builds a response from raw parts, bypassing the draft step.
    /// Useful to test serialization with a pinned `Date`.
    pub fn from_parts(
        version: HttpVersion,
        status: Option<String>,
        headers: Vec<(String, String)>,
        body: Option<Vec<Bytes>>,
    ) -> Response {
        Response {
            version,
            status,
            headers,
            body,
        }
    }

    /// The response protocol version.
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// The status, once set.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// The headers accumulated so far.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Whether a body has been installed.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Sets the status, exactly once.
    ///
    /// # Panics
    ///
    /// Panics when the status was already set.
    pub fn set_status(&mut self, status: &str) {
        assert!(self.status.is_none(), "Response status already set");
        self.status = Some(status.to_owned());
    }

    /// Merges application headers in. Names are normalized
    /// (`_` becomes `-`, then title case); an existing header of the
    /// same name is replaced in place, otherwise the field is appended.
    ///
    /// Hop-by-hop fields (and `Server`/`Date`, which the draft layer
    /// owns) are refused with `InvalidHeader`.
    pub fn extend_headers(&mut self, extra: &[(String, String)]) -> Result<()> {
        for (name, value) in extra {
            let name = name.replace('_', "-");
            if is_hop_by_hop(&name) {
                return Err(Error::InvalidHeader(name));
            }
            match self
                .headers
                .iter_mut()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
            {
                Some(slot) => slot.1 = value.clone(),
                None => self.headers.push((title_case(&name), value.clone())),
            }
        }
        Ok(())
    }

    /// Installs the body blocks, exactly once.
    ///
    /// Appends an accurate `Content-Length` when neither it nor a
    /// `Transfer-Encoding` is present; a `Content-Length` that is
    /// already there must agree with the blocks.
    ///
    /// # Panics
    ///
    /// Panics when the body was already set.
    pub fn set_body<I>(&mut self, blocks: I) -> Result<()>
    where
        I: IntoIterator<Item = Bytes>,
    {
        assert!(self.body.is_none(), "Response body already set");
        let blocks: Vec<Bytes> = blocks.into_iter().collect();
        let body_length: u64 = blocks.iter().map(|b| b.len() as u64).sum();

        let declared = self.find_header("content-length").map(str::to_owned);
        let has_te = self.find_header("transfer-encoding").is_some();
        match declared {
            Some(value) => {
                let declared: u64 = value
                    .parse()
                    .map_err(|_| Error::InvalidHeader("CONTENT-LENGTH".into()))?;
                if declared != body_length {
                    return Err(Error::ContentLengthMismatch {
                        body: body_length,
                        declared,
                    });
                }
            }
            None if !has_te => {
                let mut digits = String::new();
                itoa::fmt(&mut digits, body_length).expect("formatting to a String");
                self.headers.push(("Content-Length".to_owned(), digits));
            }
            None => {}
        }
        self.body = Some(blocks);
        Ok(())
    }

    /// Whether `Transfer-Encoding` names `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.find_header("transfer-encoding")
            .map(|value| {
                value
                    .split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            })
            .unwrap_or(false)
    }

    fn find_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the status line and header block, latin-1 encoded.
    ///
    /// # Panics
    ///
    /// Panics when status or body have not been set yet.
    pub fn headers_data(&self) -> Vec<u8> {
        let status = self.status.as_ref().expect("Response status not set");
        assert!(self.body.is_some(), "Response body not set");

        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(self.version.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&string_to_latin1(status));
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            out.extend_from_slice(&string_to_latin1(name));
            out.extend_from_slice(b": ");
            out.extend_from_slice(&string_to_latin1(value));
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// The body as wire frames: raw blocks when length-framed, or
    /// `hex(len)\r\n<data>\r\n` chunks with a final `0\r\n\r\n` when
    /// `Transfer-Encoding: chunked` is in play.
    ///
    /// # Panics
    ///
    /// Panics when the body has not been set.
    pub fn body_stream(&self) -> BodyStream<'_> {
        let blocks = self.body.as_ref().expect("Response body not set");
        BodyStream {
            blocks: blocks.iter(),
            chunked: self.is_chunked(),
            terminated: false,
        }
    }

    /// A synthetic `400 Bad Request` carrying the parse failure.
    pub fn bad_request(err: &Error) -> Response {
        Response::error_page("400 Bad Request", err)
    }

    /// A synthetic `500 Internal Server Error`.
    pub fn internal_server_error<E: fmt::Display>(err: E) -> Response {
        Response::error_page("500 Internal Server Error", err)
    }

    fn error_page<E: fmt::Display>(status: &str, err: E) -> Response {
        let reason = &status[4..];
        let html = format!(
            "<html><head><title>{}</title></head><body><h1>{}</h1><p>{}</p></body></html>",
            reason, reason, err
        );
        let body = Bytes::from(html.into_bytes());
        let mut length = String::new();
        itoa::fmt(&mut length, body.len()).expect("formatting to a String");
        Response {
            version: HTTP_11,
            status: Some(status.to_owned()),
            headers: vec![
                ("Date".to_owned(), fmt_http_date(SystemTime::now())),
                ("Server".to_owned(), SERVER.to_owned()),
                ("Connection".to_owned(), "close".to_owned()),
                ("Content-Type".to_owned(), "text/html".to_owned()),
                ("Content-Length".to_owned(), length),
            ],
            body: Some(vec![body]),
        }
    }
}

/// Iterator over the wire frames of a response body.
#[derive(Debug)]
pub struct BodyStream<'a> {
    blocks: std::slice::Iter<'a, Bytes>,
    chunked: bool,
    terminated: bool,
}

/// One chunked frame: `hex(len)\r\n<data>\r\n`. An empty block frames
/// as the `0\r\n\r\n` terminator by construction.
fn chunk_frame(data: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut frame = Vec::with_capacity(data.len() + 8);
    write!(frame, "{:x}\r\n", data.len()).expect("writing to a Vec");
    frame.extend_from_slice(data);
    frame.extend_from_slice(b"\r\n");
    frame
}

impl<'a> Iterator for BodyStream<'a> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if !self.chunked {
            return self.blocks.next().map(|b| b.to_vec());
        }
        if self.terminated {
            return None;
        }
        match self.blocks.next() {
            Some(block) if block.is_empty() => {
                self.terminated = true;
                Some(b"0\r\n\r\n".to_vec())
            }
            Some(block) => Some(chunk_frame(block)),
            None => {
                self.terminated = true;
                Some(b"0\r\n\r\n".to_vec())
            }
        }
    }
}
