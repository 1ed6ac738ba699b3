// ABOUTME: Decodes fetched page bytes to text using the Content-Type header, an in-body charset, or UTF-8.
// ABOUTME: The precedence is fixed: header charset, then a charset sniffed from the first 1024 bytes, then UTF-8.

//! Character set detection and decoding.
//!
//! Unlike a statistical detector, this follows a strict declaration chain:
//!
//! 1. `charset=` in the `Content-Type` header, when the header is present and non-empty;
//! 2. a `charset=` declaration in the first 1024 bytes of the body (typically a
//!    `<meta charset>` or `<meta http-equiv="Content-Type">` tag);
//! 3. UTF-8.
//!
//! A label that `encoding_rs` does not recognize counts as no declaration.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

/// Number of leading body bytes searched for an in-body charset declaration.
pub const SNIFF_LENGTH: usize = 1024;

static HEADER_CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset=([\w-]+)").expect("valid regex"));

static BODY_CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset=["']?([\w-]+)["']?"#).expect("valid regex"));

/// Where the encoding used for decoding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    Header,
    Sniffed,
    Default,
}

/// Text decoded from a response body.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
    pub source: CharsetSource,
}

/// Finds the charset label declared in a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    if content_type.is_empty() {
        return None;
    }
    HEADER_CHARSET_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Finds a charset label declared in the first [`SNIFF_LENGTH`] bytes of a body.
///
/// The prefix is decoded as UTF-8 with replacement, so a truncated multi-byte
/// sequence at the cut never prevents detection.
pub fn sniff_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(SNIFF_LENGTH)];
    let text = String::from_utf8_lossy(head);
    BODY_CHARSET_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Picks the encoding for a body following the header, sniffed, default precedence.
pub fn detect_encoding(
    body: &[u8],
    content_type: Option<&str>,
) -> (&'static Encoding, CharsetSource) {
    if let Some(encoding) = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return (encoding, CharsetSource::Header);
    }

    if let Some(encoding) =
        sniff_charset(body).and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return (encoding, CharsetSource::Sniffed);
    }

    (UTF_8, CharsetSource::Default)
}

/// Decodes a body to text. Malformed sequences become U+FFFD.
pub fn decode(body: &[u8], content_type: Option<&str>) -> Decoded {
    let (encoding, source) = detect_encoding(body, content_type);
    let (text, had_errors) = encoding.decode_with_bom_removal(body);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "body contained malformed sequences");
    }
    Decoded {
        text: text.into_owned(),
        encoding,
        source,
    }
}
