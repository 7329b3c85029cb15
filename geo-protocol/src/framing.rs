//! Packet framing: a 2-byte little-endian length prefix (inclusive of
//! itself) followed by the body. The length prefix always travels in the
//! clear; encryption applies to the body only.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::ProtocolError;

/// Reads one framed packet body from `r`.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let length = r.read_u16::<LittleEndian>()?;
    if length < 2 {
        return Err(ProtocolError::InvalidFrameLength(length));
    }

    let mut body = vec![0u8; length as usize - 2];
    r.read_exact(&mut body)?;
    Ok(body)
}

/// Writes `body` as one framed packet: a length prefix, then the bytes.
pub fn write_frame<W: Write>(w: &mut W, body: &[u8]) -> Result<(), ProtocolError> {
    let length = body
        .len()
        .checked_add(2)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or(ProtocolError::FrameTooLarge(body.len()))?;

    w.write_u16::<LittleEndian>(length)?;
    w.write_all(body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_body() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        assert_eq!(buf.len(), 7);

        let mut cursor = Cursor::new(buf);
        let body = read_frame(&mut cursor).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn rejects_a_length_shorter_than_the_prefix_itself() {
        let mut cursor = Cursor::new(vec![1u8, 0]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFrameLength(1)));
    }

    #[test]
    fn rejects_an_oversized_body() {
        let body = vec![0u8; u16::MAX as usize];
        let err = write_frame(&mut Vec::new(), &body).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
    }
}
