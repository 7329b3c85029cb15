//! RSA modulus descrambling and raw (unpadded) RSA encryption, as used by
//! the login server's credential exchange. No PKCS padding is involved —
//! the server expects the 128-byte credential block to be encrypted as a
//! single big-endian integer.

use num_bigint::BigUint;

use crate::CryptoError;

pub const MODULUS_LEN: usize = 128;
pub const PUBLIC_EXPONENT: u32 = 65537;

const USERNAME_OFFSET: usize = 0x5E;
const USERNAME_MAX_LEN: usize = 14;
const PASSWORD_OFFSET: usize = 0x6C;
const PASSWORD_MAX_LEN: usize = 16;
const TRAILING_ZERO_OFFSET: usize = 0x7C;

/// Reverses the four scrambling passes the login server applies to its
/// RSA modulus before sending it in the Init packet, yielding the raw
/// big-endian modulus.
pub fn descramble_modulus(scrambled: &[u8; MODULUS_LEN]) -> [u8; MODULUS_LEN] {
    let mut m = *scrambled;

    for i in 0..0x40 {
        m[0x40 + i] ^= m[i];
    }
    for i in 0..4 {
        m[0x0D + i] ^= m[0x34 + i];
    }
    for i in 0..0x40 {
        m[i] ^= m[0x40 + i];
    }
    m.swap(0x00, 0x4D);
    m.swap(0x01, 0x4E);
    m.swap(0x02, 0x4F);
    m.swap(0x03, 0x50);

    m
}

/// Re-applies the scrambling passes in forward order; used to round-trip
/// a descrambled modulus back to the wire representation for tests.
pub fn scramble_modulus(descrambled: &[u8; MODULUS_LEN]) -> [u8; MODULUS_LEN] {
    let mut m = *descrambled;

    m.swap(0x00, 0x4D);
    m.swap(0x01, 0x4E);
    m.swap(0x02, 0x4F);
    m.swap(0x03, 0x50);
    for i in 0..0x40 {
        m[i] ^= m[0x40 + i];
    }
    for i in 0..4 {
        m[0x0D + i] ^= m[0x34 + i];
    }
    for i in 0..0x40 {
        m[0x40 + i] ^= m[i];
    }

    m
}

/// Builds the 128-byte credential block: zero-filled, with the ASCII
/// username and password written at their fixed offsets.
pub fn build_credential_block(username: &str, password: &str) -> Result<[u8; MODULUS_LEN], CryptoError> {
    if !username.is_ascii() || username.len() > USERNAME_MAX_LEN {
        return Err(CryptoError::CredentialTooLong("username"));
    }
    if !password.is_ascii() || password.len() > PASSWORD_MAX_LEN {
        return Err(CryptoError::CredentialTooLong("password"));
    }

    let mut block = [0u8; MODULUS_LEN];
    block[USERNAME_OFFSET..USERNAME_OFFSET + username.len()].copy_from_slice(username.as_bytes());
    block[PASSWORD_OFFSET..PASSWORD_OFFSET + password.len()].copy_from_slice(password.as_bytes());
    block[TRAILING_ZERO_OFFSET..TRAILING_ZERO_OFFSET + 4].copy_from_slice(&0u32.to_le_bytes());

    Ok(block)
}

/// Raw RSA encryption: `c = m^e mod n`, with `m` interpreted as a single
/// big-endian integer occupying the whole 128-byte block.
pub fn encrypt_block(modulus: &[u8; MODULUS_LEN], plaintext: &[u8; MODULUS_LEN]) -> [u8; MODULUS_LEN] {
    encrypt_block_with_exponent(modulus, &BigUint::from(PUBLIC_EXPONENT), plaintext)
}

fn encrypt_block_with_exponent(
    modulus: &[u8; MODULUS_LEN],
    exponent: &BigUint,
    plaintext: &[u8; MODULUS_LEN],
) -> [u8; MODULUS_LEN] {
    let n = BigUint::from_bytes_be(modulus);
    let m = BigUint::from_bytes_be(plaintext);

    let c = m.modpow(exponent, &n);

    let mut out = [0u8; MODULUS_LEN];
    let bytes = c.to_bytes_be();
    out[MODULUS_LEN - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Raw RSA decryption with the matching private exponent `d`; only used
/// by tests to validate a known key pair round-trips.
pub fn decrypt_block(
    modulus: &[u8; MODULUS_LEN],
    private_exponent: &BigUint,
    ciphertext: &[u8; MODULUS_LEN],
) -> [u8; MODULUS_LEN] {
    let n = BigUint::from_bytes_be(modulus);
    let c = BigUint::from_bytes_be(ciphertext);

    let m = c.modpow(private_exponent, &n);

    let mut out = [0u8; MODULUS_LEN];
    let bytes = m.to_bytes_be();
    out[MODULUS_LEN - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Encrypts a credential block against a descrambled login-server modulus.
pub fn rsa_encrypt_credentials(
    modulus: &[u8; MODULUS_LEN],
    username: &str,
    password: &str,
) -> Result<[u8; MODULUS_LEN], CryptoError> {
    let block = build_credential_block(username, password)?;
    Ok(encrypt_block(modulus, &block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scramble_and_descramble_are_inverses() {
        let mut original = [0u8; MODULUS_LEN];
        for (i, b) in original.iter_mut().enumerate() {
            *b = (i * 7 + 3) as u8;
        }

        let scrambled = scramble_modulus(&original);
        let round_tripped = descramble_modulus(&scrambled);

        assert_eq!(original, round_tripped);
    }

    #[test]
    fn credential_block_places_fields_at_fixed_offsets() {
        let block = build_credential_block("testuser", "hunter2").unwrap();

        assert_eq!(&block[USERNAME_OFFSET..USERNAME_OFFSET + 8], b"testuser");
        assert_eq!(&block[PASSWORD_OFFSET..PASSWORD_OFFSET + 7], b"hunter2");
        assert_eq!(&block[TRAILING_ZERO_OFFSET..TRAILING_ZERO_OFFSET + 4], &[0, 0, 0, 0]);
    }

    #[test]
    fn rejects_oversized_username() {
        let err = build_credential_block("this_username_is_way_too_long", "pw").unwrap_err();
        assert!(matches!(err, CryptoError::CredentialTooLong("username")));
    }

    #[test]
    fn textbook_keypair_round_trips_through_modpow() {
        // Classic RSA textbook example (p=61, q=53, e=17, d=2753, n=3233),
        // padded out to the 128-byte block width this module always uses.
        let mut modulus = [0u8; MODULUS_LEN];
        modulus[MODULUS_LEN - 2..].copy_from_slice(&3233u16.to_be_bytes());

        let mut plaintext = [0u8; MODULUS_LEN];
        plaintext[MODULUS_LEN - 1] = 65;

        let e = BigUint::from(17u32);
        let ciphertext = encrypt_block_with_exponent(&modulus, &e, &plaintext);
        assert_ne!(ciphertext, plaintext);

        let d = BigUint::from(2753u32);
        let recovered = decrypt_block(&modulus, &d, &ciphertext);

        assert_eq!(recovered, plaintext);
    }
}
