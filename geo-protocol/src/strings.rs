//! UTF-16LE null-terminated string encoding, as used throughout both
//! handshakes for names, commands, and chat text.

use byteorder::{ByteOrder, LittleEndian};

use crate::ProtocolError;

/// Encodes `s` as UTF-16LE followed by a two-byte null terminator.
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2 + 2);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    out
}

/// Decodes a UTF-16LE null-terminated string starting at `offset`. Returns
/// the decoded string and the number of bytes consumed, including the
/// terminator.
pub fn decode_utf16le(data: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    let mut end = offset;
    while end + 1 < data.len() {
        if data[end] == 0 && data[end + 1] == 0 {
            let units: Vec<u16> = data[offset..end]
                .chunks_exact(2)
                .map(|c| LittleEndian::read_u16(c))
                .collect();
            let s = String::from_utf16_lossy(&units);
            return Ok((s, end + 2 - offset));
        }
        end += 2;
    }
    Err(ProtocolError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_and_unicode() {
        for s in ["testuser", "héllo", ""] {
            let encoded = encode_utf16le(s);
            let (decoded, consumed) = decode_utf16le(&encoded, 0).unwrap();
            assert_eq!(decoded, s);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn truncated_string_is_an_error() {
        let encoded = encode_utf16le("abc");
        let err = decode_utf16le(&encoded[..encoded.len() - 2], 0).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated));
    }
}
