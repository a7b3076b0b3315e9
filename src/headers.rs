//! Header field grammar and text helpers.
//!
//! RFC 9110 §5.6.2 defines the `token` production used for methods,
//! field names and transfer codings:
//!
//! ```notrust
//! token  = 1*tchar
//! tchar  = "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "." /
//!          "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA
//! ```
//!
//! Delimiters (`"(),/:;<=>?@[\]{}` and whitespace) never match.

/// The non-alphanumeric characters `tchar` admits.
const TOKEN_SPECIALS: &[u8] = b"!#$%&'*+-.^_`|~";

/// Whether a byte is a `tchar`.
#[inline]
pub fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || TOKEN_SPECIALS.contains(&b)
}

/// Whether a string is a non-empty run of `tchar`s.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_tchar)
}

/// Hop-by-hop fields the application is not allowed to set; the draft
/// layer owns them (plus `Server` and `Date`, which it also controls).
pub const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "server",
    "date",
];

/// Whether `name` (any case) belongs to the hop-by-hop set.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Title-cases a header name for the wire: `content_type` / `CONTENT-TYPE`
/// become `Content-Type`. Segments between dashes get one leading capital.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_start = true;
    for c in name.chars() {
        if c == '-' {
            out.push('-');
            at_start = true;
        } else if at_start {
            out.extend(c.to_uppercase());
            at_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Decodes wire bytes as latin-1: every byte is its own code point.
/// Header text on the wire is latin-1 by tradition; this never fails.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encodes text back to latin-1 wire bytes. Code points above U+00FF
/// cannot appear in headers this crate produced; they are replaced with
/// `?` rather than corrupting the framing.
pub fn string_to_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect()
}
