//! Reversible mapping from resource keys to file names
//!
//! Every byte that is unsafe in a file name is written as the escape
//! character followed by two uppercase hex digits. Unsafe bytes are control
//! characters, DEL, every byte of a non-ASCII character, path separators,
//! characters reserved on common filesystems, the escape character itself,
//! and a leading `.` so no name can be `.`, `..`, or hidden. Because the
//! escape character is always escaped, decoding is unambiguous and the
//! mapping is injective.
//!
//! The empty key maps to a lone escape character, which no other key can
//! produce.

use crate::constants::cache_layout::ESCAPE_CHAR;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";
const RESERVED: &[u8] = b"/\\:*?\"<>|";

fn needs_escape(byte: u8, index: usize) -> bool {
    byte < 0x20
        || byte >= 0x7F
        || byte == ESCAPE_CHAR as u8
        || RESERVED.contains(&byte)
        || (index == 0 && byte == b'.')
}

/// Escape a resource key into a file name
pub fn escape_key(key: &str) -> String {
    if key.is_empty() {
        return ESCAPE_CHAR.to_string();
    }

    let mut escaped = String::with_capacity(key.len());
    for (index, byte) in key.bytes().enumerate() {
        if needs_escape(byte, index) {
            escaped.push(ESCAPE_CHAR);
            escaped.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            escaped.push(HEX_DIGITS[(byte & 0x0F) as usize] as char);
        } else {
            escaped.push(byte as char);
        }
    }
    escaped
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Recover the resource key from a file name produced by [`escape_key`]
///
/// Returns `None` for names that are not valid escapes, such as temporary
/// write files or stray files in the cache directory.
pub fn unescape_key(name: &str) -> Option<String> {
    if name.len() == 1 && name.starts_with(ESCAPE_CHAR) {
        return Some(String::new());
    }

    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte == ESCAPE_CHAR as u8 {
            let high = hex_value(*bytes.get(index + 1)?)?;
            let low = hex_value(*bytes.get(index + 2)?)?;
            decoded.push((high << 4) | low);
            index += 3;
        } else {
            if needs_escape(byte, index) {
                return None;
            }
            decoded.push(byte);
            index += 1;
        }
    }

    String::from_utf8(decoded).ok()
}
