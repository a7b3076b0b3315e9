//! Request-target splitting.
//!
//! The request line carries a target in origin form (`/where?q=now`),
//! absolute form (`http://example.org/pub`), or asterisk form (`*`).
//! This module splits any of them into `(path, query, fragment)` without
//! judging the contents; percent-decoding is the application's business.

/// The split pieces of a request target. Missing pieces are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestTarget {
    /// The path, leading slashes preserved (`//host/x` stays `//host/x`).
    pub path: String,
    /// Everything after the first `?` (exclusive), before the fragment.
    pub query: String,
    /// Everything after the first `#` (exclusive).
    pub fragment: String,
}

/// Splits a request target into path, query and fragment.
///
/// A target beginning with `//` is an abs_path, not an authority; generic
/// URI splitters mistake it for a network location, so it is carved off
/// before the scheme check (the classic dot-prefix workaround).
pub fn split_request_uri(uri: &str) -> RequestTarget {
    let (rest, fragment) = match uri.find('#') {
        Some(i) => (&uri[..i], &uri[i + 1..]),
        None => (uri, ""),
    };
    let (rest, query) = match rest.find('?') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, ""),
    };

    let path = if rest.starts_with("//") {
        // abs_path with a doubled slash; keep it verbatim.
        rest.to_owned()
    } else if let Some(scheme_end) = rest.find("://") {
        // absolute form: skip scheme and authority.
        let after = &rest[scheme_end + 3..];
        match after.find('/') {
            Some(i) => after[i..].to_owned(),
            None => String::new(),
        }
    } else {
        rest.to_owned()
    };

    RequestTarget {
        path,
        query: query.to_owned(),
        fragment: fragment.to_owned(),
    }
}
