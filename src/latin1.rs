//! Latin-1 conversion for strings crossing the SANE boundary.
//!
//! SANE strings are byte strings in ISO 8859-1. Every byte maps to the
//! Unicode scalar of the same value, so decoding never fails; encoding fails
//! for characters above U+00FF.

use crate::error::{Result, ScanError};

/// Decode Latin-1 bytes.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Encode a string as Latin-1 bytes.
///
/// Fails for characters outside Latin-1 and for embedded NULs, which would
/// silently cut the string short on the C side.
pub fn encode(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .map(|c| {
            u8::try_from(c)
                .ok()
                .filter(|&b| b != 0)
                .ok_or_else(|| ScanError::InvalidName(s.to_owned()))
        })
        .collect()
}

/// Encode into a NUL-terminated buffer of `size` bytes, truncating the
/// string to `size - 1` bytes.
pub fn encode_truncated(s: &str, size: usize) -> Result<Vec<u8>> {
    let mut bytes = encode(s)?;
    bytes.truncate(size.saturating_sub(1));
    bytes.resize(size.max(1), 0);
    Ok(bytes)
}
