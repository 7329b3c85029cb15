//! Cryptographic primitives for the login and game server protocols:
//! non-standard little-endian Blowfish, raw RSA credential encryption,
//! the login packet checksum/XOR pass, and the game server's
//! self-synchronizing XOR stream cipher.

mod blowfish_consts;

pub mod blowfish;
pub mod game_cipher;
pub mod login_xor;
pub mod rsa;

pub use blowfish::Blowfish;
pub use game_cipher::GameCipher;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid blowfish key length: {0} bytes")]
    InvalidKeyLength(usize),

    #[error("buffer length {0} is not a multiple of the 8-byte block size")]
    BlockAlignment(usize),

    #[error("buffer length {0} is not a non-zero multiple of 4 bytes")]
    ChecksumAlignment(usize),

    #[error("login packet checksum mismatch")]
    ChecksumMismatch,

    #[error("{0} exceeds the credential block's fixed field width")]
    CredentialTooLong(&'static str),

    #[error("RSA modulus is corrupt or has an unexpected length")]
    RsaModulusCorrupt,
}
