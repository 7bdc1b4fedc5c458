//! Ciphertext token shape detection.
//!
//! A value is treated as an encrypted token purely by shape: hex segments
//! joined by [`SEPARATOR`]. The check gates the write path (no double
//! encryption) and the read path (no decryption attempt on plaintext).
//!
//! # Known limitation
//!
//! Plaintext that happens to look like `hex:hex` (for example `"cafe:babe"`)
//! is indistinguishable from a real token. It is skipped on write and left
//! as-is on read.
//!
//! The empty string is never encrypted, so `encrypt("")` returns `""` and is
//! the one output of the engine that does not look encrypted.

use serde_json::Value;

/// Character separating the hex segments of a token.
pub const SEPARATOR: char = ':';

/// Structural variants of a ciphertext token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// `<hex-ciphertext>:<hex-tag>`, encrypted under the process-wide IV.
    FixedIv,
    /// `<hex-iv>:<hex-ciphertext>:<hex-tag>`, encrypted under a per-value IV.
    PerValueIv,
}

/// Returns `true` if `value` has exactly one separator and both halves are hex.
pub fn looks_encrypted(value: &str) -> bool {
    classify(value) == Some(TokenShape::FixedIv)
}

/// [`looks_encrypted`] for JSON values. Non-strings are never tokens.
pub fn looks_encrypted_value(value: &Value) -> bool {
    value.as_str().is_some_and(looks_encrypted)
}

/// Classify `value` by token shape, or `None` if it is not token-shaped.
pub fn classify(value: &str) -> Option<TokenShape> {
    let mut segments = 0;
    for segment in value.split(SEPARATOR) {
        if !is_hex(segment) {
            return None;
        }
        segments += 1;
    }
    match segments {
        2 => Some(TokenShape::FixedIv),
        3 => Some(TokenShape::PerValueIv),
        _ => None,
    }
}

fn is_hex(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_hexdigit())
}
