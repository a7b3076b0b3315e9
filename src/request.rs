//! Parsed requests.
//!
//! A [`Request`] is immutable once the parser yields it: the head
//! carries the request line and headers, the body is already decoded,
//! and trailers (chunked bodies only) ride alongside.

use crate::body::RequestBody;
use crate::version::HttpVersion;

/// The request line and header block of a request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// The method token, as sent.
    pub method: String,
    /// The request path, leading slashes preserved.
    pub path: String,
    /// The query string (no `?`), empty when absent.
    pub query: String,
    /// The fragment (no `#`), empty when absent.
    pub fragment: String,
    /// The protocol version.
    pub version: HttpVersion,
    /// Header fields as `(NAME, value)`, names uppercased, duplicates
    /// preserved in arrival order.
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Whether a `Connection: close` header is present (values matched
    /// case-insensitively).
    pub fn has_connection_close_header(&self) -> bool {
        self.headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("connection") && value.eq_ignore_ascii_case("close")
        })
    }

    /// The `Upgrade` header pair, but only when the request also asks
    /// for the switch with `Connection: upgrade`. An `Upgrade` header on
    /// its own means nothing.
    pub fn upgrade_header(&self) -> Option<(String, String)> {
        let requested = self.headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("connection") && value.eq_ignore_ascii_case("upgrade")
        });
        if !requested {
            return None;
        }
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("upgrade"))
            .cloned()
    }

    /// Whether both framing headers appear; a response to such a
    /// request must not keep the connection alive.
    pub fn has_transfer_encoding_and_content_length_headers(&self) -> bool {
        let te = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("transfer-encoding"));
        let cl = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-length"));
        te && cl
    }
}

/// A complete parsed request.
#[derive(Debug)]
pub struct Request {
    /// Request line and headers.
    pub head: RequestHead,
    /// The decoded body stream; empty-body requests still carry one.
    pub body: RequestBody,
    /// Trailer fields, non-empty only for chunked bodies that had them.
    pub trailers: Vec<(String, String)>,
}

impl Request {
    /// The method token.
    #[inline]
    pub fn method(&self) -> &str {
        &self.head.method
    }

    /// The request path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.head.path
    }

    /// The query string.
    #[inline]
    pub fn query(&self) -> &str {
        &self.head.query
    }

    /// The fragment.
    #[inline]
    pub fn fragment(&self) -> &str {
        &self.head.fragment
    }

    /// The protocol version.
    #[inline]
    pub fn version(&self) -> HttpVersion {
        self.head.version
    }

    /// The headers, `(NAME, value)` in arrival order.
    #[inline]
    pub fn headers(&self) -> &[(String, String)] {
        &self.head.headers
    }

    /// Takes the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> RequestBody {
        std::mem::replace(&mut self.body, RequestBody::empty())
    }
}
