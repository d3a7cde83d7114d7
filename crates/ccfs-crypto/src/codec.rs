//! Metadata codec: sealed bytes ↔ text-safe strings
//!
//! The sealed filename travels inside an S3 user-metadata value and, in the
//! direct transfer mode, inside a URL query string. Standard padded base64
//! keeps it printable; the transport helpers add and strip one layer of
//! percent-encoding on top.
//!
//! Boundary order on the way in: [`unescape_transport`] first, then [`decode`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::CryptoError;

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
/// `+`, `/` and `=` from the base64 alphabet are all escaped.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn encode(sealed: &[u8]) -> String {
    STANDARD.encode(sealed)
}

/// Exact inverse of [`encode`]. Length budgets belong to the caller.
pub fn decode(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text)
        .map_err(|e| CryptoError::Decode(format!("base64: {e}")))
}

/// Percent-encode an already base64-encoded value for use in a URL.
pub fn escape_for_url(text: &str) -> String {
    utf8_percent_encode(text, URL_COMPONENT).to_string()
}

/// Undo one layer of transport percent-encoding.
///
/// A no-op on raw base64, which never contains `%`. `+` is kept literally:
/// in base64 it is data, not an encoded space.
pub fn unescape_transport(text: &str) -> Result<String, CryptoError> {
    percent_decode_str(text)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| CryptoError::Decode(format!("percent-decoding: {e}")))
}
