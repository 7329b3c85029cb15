//! Login-packet checksum and the Init-packet XOR obfuscation pass.
//!
//! Both operate on little-endian `u32` words over a byte span whose length
//! is a multiple of 4; the checksum additionally requires the length to
//! leave room for its own trailing word.

use byteorder::{ByteOrder, LittleEndian};

use crate::CryptoError;

/// Computes the XOR-reduction checksum over `data[0..len-4]` and writes it
/// into the last 4 bytes. `data.len()` must be a non-zero multiple of 4.
pub fn append_checksum(data: &mut [u8]) -> Result<(), CryptoError> {
    let len = data.len();
    if len == 0 || len % 4 != 0 {
        return Err(CryptoError::ChecksumAlignment(len));
    }

    let k = len - 4;
    let mut checksum = 0u32;
    for offset in (0..k).step_by(4) {
        checksum ^= LittleEndian::read_u32(&data[offset..offset + 4]);
    }

    LittleEndian::write_u32(&mut data[k..k + 4], checksum);
    Ok(())
}

/// Verifies the checksum written by [`append_checksum`], recomputing it
/// over the same span.
pub fn verify_checksum(data: &[u8]) -> Result<(), CryptoError> {
    let len = data.len();
    if len == 0 || len % 4 != 0 {
        return Err(CryptoError::ChecksumAlignment(len));
    }

    let k = len - 4;
    let mut checksum = 0u32;
    for offset in (0..k).step_by(4) {
        checksum ^= LittleEndian::read_u32(&data[offset..offset + 4]);
    }

    let stored = LittleEndian::read_u32(&data[k..k + 4]);
    if stored != checksum {
        return Err(CryptoError::ChecksumMismatch);
    }
    Ok(())
}

/// Forward XOR pass applied by the server (and reversed by the client) to
/// the login Init packet body, keyed by the session id carried in the
/// packet itself.
pub fn forward_xor_pass(data: &mut [u8], key: u32) -> Result<(), CryptoError> {
    let len = data.len();
    if len < 8 || len % 4 != 0 {
        return Err(CryptoError::ChecksumAlignment(len));
    }

    let mut ecx = key;
    let mut offset = 4;
    while offset <= len - 8 {
        let word = LittleEndian::read_u32(&data[offset..offset + 4]);
        ecx = ecx.wrapping_add(word);
        LittleEndian::write_u32(&mut data[offset..offset + 4], word ^ ecx);
        offset += 4;
    }

    LittleEndian::write_u32(&mut data[len - 8..len - 4], ecx);
    Ok(())
}

/// Reverses [`forward_xor_pass`]; run by the client after Blowfish
/// decryption to recover the Init packet's plaintext body.
pub fn reverse_xor_pass(data: &mut [u8]) -> Result<(), CryptoError> {
    let len = data.len();
    if len < 12 || len % 4 != 0 {
        return Err(CryptoError::ChecksumAlignment(len));
    }

    let mut ecx = LittleEndian::read_u32(&data[len - 8..len - 4]);
    let mut offset = len - 12;
    loop {
        let word = LittleEndian::read_u32(&data[offset..offset + 4]);
        let orig = word ^ ecx;
        LittleEndian::write_u32(&mut data[offset..offset + 4], orig);
        ecx = ecx.wrapping_sub(orig);

        if offset == 4 {
            break;
        }
        offset -= 4;
    }

    Ok(())
}

/// Pads an unencrypted login client→server payload to a multiple of 8
/// bytes with a trailing 4-byte checksum, ready for Blowfish encryption.
pub fn frame_for_encryption(payload: &[u8]) -> Vec<u8> {
    let mut framed = payload.to_vec();
    framed.extend_from_slice(&[0u8; 4]);

    let padded_len = (framed.len() + 7) / 8 * 8;
    framed.resize(padded_len, 0);

    append_checksum(&mut framed).expect("framed length is always a non-zero multiple of 4");
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_round_trips() {
        let mut buf = vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0];
        append_checksum(&mut buf).unwrap();
        assert!(verify_checksum(&buf).is_ok());

        buf[0] ^= 0xFF;
        assert!(matches!(
            verify_checksum(&buf),
            Err(CryptoError::ChecksumMismatch)
        ));
    }

    #[test]
    fn xor_pass_round_trips() {
        let session_id = 0xCAFEBABEu32;
        let mut buf = vec![0u8; 32];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = i as u8;
        }
        LittleEndian::write_u32(&mut buf[0..4], session_id);
        let original = buf.clone();

        forward_xor_pass(&mut buf, session_id).unwrap();
        assert_ne!(buf[4..buf.len() - 8], original[4..original.len() - 8]);

        reverse_xor_pass(&mut buf).unwrap();
        assert_eq!(buf[0..4], original[0..4]);
        assert_eq!(buf[4..buf.len() - 8], original[4..original.len() - 8]);
    }

    #[test]
    fn frame_for_encryption_pads_to_block_size() {
        let framed = frame_for_encryption(b"hello");
        assert_eq!(framed.len() % 8, 0);
        assert!(verify_checksum(&framed).is_ok());
    }
}
