//! Non-standard, little-endian Blowfish.
//!
//! The login and game servers both read each 8-byte block as two 32-bit
//! *little-endian* words before running the ordinary Blowfish Feistel
//! network, rather than the standard big-endian interpretation. We get
//! there by byte-swapping each 4-byte half of the block before and after
//! calling the textbook algorithm; the Feistel round function and key
//! schedule below are otherwise unmodified Blowfish.

use crate::blowfish_consts::{PBOX, SBOX0, SBOX1, SBOX2, SBOX3};
use crate::CryptoError;

/// The static key used only to decrypt the login server's initial Init
/// packet, before the dynamic session key has been negotiated.
pub const STATIC_INIT_KEY: [u8; 16] = [
    0x6B, 0x60, 0xCB, 0x5B, 0x82, 0xCE, 0x90, 0xB1, 0xCC, 0x2B, 0x6C, 0x55, 0x6C, 0x6C, 0x6C, 0x6C,
];

pub struct Blowfish {
    pbox: [u32; 18],
    sbox: [[u32; 256]; 4],
}

impl Blowfish {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() || key.len() > 56 {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }

        let bf = Blowfish {
            pbox: PBOX,
            sbox: [SBOX0, SBOX1, SBOX2, SBOX3],
        };

        Ok(bf.key_schedule(key))
    }

    #[inline(always)]
    fn feistel_f(&self, x: u32) -> u32 {
        let b = x.to_be_bytes();
        let a = self.sbox[0][b[0] as usize];
        let c = self.sbox[1][b[1] as usize];
        let d = self.sbox[2][b[2] as usize];
        let e = self.sbox[3][b[3] as usize];
        e.wrapping_add(d ^ c.wrapping_add(a))
    }

    fn encrypt_lr(&self, l: &mut u32, r: &mut u32) {
        for i in (0..16).step_by(2) {
            *l ^= self.pbox[i];
            *r ^= self.feistel_f(*l);
            *r ^= self.pbox[i + 1];
            *l ^= self.feistel_f(*r);
        }
        *l ^= self.pbox[16];
        *r ^= self.pbox[17];
        std::mem::swap(l, r);
    }

    fn decrypt_lr(&self, l: &mut u32, r: &mut u32) {
        for i in (2..18).step_by(2).rev() {
            *l ^= self.pbox[i + 1];
            *r ^= self.feistel_f(*l);
            *r ^= self.pbox[i];
            *l ^= self.feistel_f(*r);
        }
        *l ^= self.pbox[1];
        *r ^= self.pbox[0];
        std::mem::swap(l, r);
    }

    fn key_schedule(mut self, key: &[u8]) -> Self {
        let mut rolling_key = key.iter().cycle().copied();

        for pb in self.pbox.iter_mut() {
            let subkey = (&mut rolling_key)
                .take(4)
                .fold(0u32, |acc, byte| (acc << 8) | byte as u32);
            *pb ^= subkey;
        }

        let mut l = 0u32;
        let mut r = 0u32;

        for i in (0..18).step_by(2) {
            self.encrypt_lr(&mut l, &mut r);
            self.pbox[i] = l;
            self.pbox[i + 1] = r;
        }

        for sbox in self.sbox.iter_mut() {
            for i in (0..256).step_by(2) {
                self.encrypt_lr(&mut l, &mut r);
                sbox[i] = l;
                sbox[i + 1] = r;
            }
        }

        self
    }

    /// Encrypts `data` in place in 8-byte ECB blocks, after byte-swapping
    /// each half of the block (the server's little-endian quirk).
    pub fn encrypt(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.transform(data, true)
    }

    /// Decrypts `data` in place in 8-byte ECB blocks.
    pub fn decrypt(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        self.transform(data, false)
    }

    fn transform(&self, data: &mut [u8], encrypting: bool) -> Result<(), CryptoError> {
        if data.len() % 8 != 0 {
            return Err(CryptoError::BlockAlignment(data.len()));
        }

        for block in data.chunks_exact_mut(8) {
            block[0..4].reverse();
            block[4..8].reverse();

            let mut l = u32::from_be_bytes(block[0..4].try_into().unwrap());
            let mut r = u32::from_be_bytes(block[4..8].try_into().unwrap());

            if encrypting {
                self.encrypt_lr(&mut l, &mut r);
            } else {
                self.decrypt_lr(&mut l, &mut r);
            }

            block[0..4].copy_from_slice(&l.to_be_bytes());
            block[4..8].copy_from_slice(&r.to_be_bytes());

            block[0..4].reverse();
            block[4..8].reverse();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_multi_block_buffer() {
        let bf = Blowfish::new(&STATIC_INIT_KEY).unwrap();
        let original = b"exactly sixteen!".to_vec(); // 17 bytes, trimmed below
        let mut buf = original[..16].to_vec();
        let plain = buf.clone();

        bf.encrypt(&mut buf).unwrap();
        assert_ne!(buf, plain);

        bf.decrypt(&mut buf).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn rejects_misaligned_buffers() {
        let bf = Blowfish::new(&STATIC_INIT_KEY).unwrap();
        let mut buf = vec![0u8; 7];
        assert!(matches!(
            bf.encrypt(&mut buf),
            Err(CryptoError::BlockAlignment(7))
        ));
    }

    #[test]
    fn rejects_oversized_keys() {
        let buf = [0u8; 57];
        assert!(matches!(
            Blowfish::new(&buf),
            Err(CryptoError::InvalidKeyLength(57))
        ));
    }
}
