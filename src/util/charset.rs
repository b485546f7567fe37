//! Windows-1252 codec for fixed-width name fields.
//!
//! Bone, sequence, material and morph names are stored as NUL-padded
//! Windows-1252 strings. Section names are plain Latin-1/ASCII.

use super::{Error, NameKind, Result};

/// Code points for bytes `0x80..=0x9F`; `None` marks bytes undefined in
/// Windows-1252.
const HIGH_CONTROL: [Option<char>; 32] = [
    Some('\u{20AC}'), None,            Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None,            Some('\u{017D}'), None,
    None,             Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None,            Some('\u{017E}'), Some('\u{0178}'),
];

/// Encode one character, `None` if it has no Windows-1252 byte.
fn encode_char(c: char) -> Option<u8> {
    let cp = c as u32;
    match cp {
        0x00..=0x7F | 0xA0..=0xFF => Some(cp as u8),
        _ => HIGH_CONTROL
            .iter()
            .position(|&m| m == Some(c))
            .map(|i| 0x80 + i as u8),
    }
}

/// Decode one byte; undefined bytes become U+FFFD.
fn decode_byte(b: u8) -> char {
    match b {
        0x80..=0x9F => HIGH_CONTROL[(b - 0x80) as usize].unwrap_or('\u{FFFD}'),
        _ => b as char,
    }
}

/// Encode a string to Windows-1252 bytes.
pub fn encode_cp1252(s: &str) -> Option<Vec<u8>> {
    s.chars().map(encode_char).collect()
}

/// Decode Windows-1252 bytes, replacing undefined bytes.
pub fn decode_cp1252(bytes: &[u8]) -> String {
    bytes.iter().copied().map(decode_byte).collect()
}

/// Bytes up to the first NUL.
#[inline]
fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Encode `name` into an `N`-byte field: truncated to `N` bytes, NUL padded.
pub fn encode_fixed<const N: usize>(name: &str, kind: NameKind) -> Result<[u8; N]> {
    let bytes = encode_cp1252(name).ok_or_else(|| Error::encoding(kind, name))?;
    let mut out = [0u8; N];
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    Ok(out)
}

/// Decode a NUL-padded Windows-1252 field.
pub fn decode_fixed(bytes: &[u8]) -> String {
    decode_cp1252(until_nul(bytes))
}

/// Decode a NUL-padded Latin-1 field (section names).
pub fn decode_latin1(bytes: &[u8]) -> String {
    until_nul(bytes).iter().map(|&b| b as char).collect()
}

/// Bone names accepted by strict exports: ASCII letters, digits, `_`, `-`
/// and spaces.
pub fn is_restricted_bone_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
}
