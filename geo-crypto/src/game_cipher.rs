//! Game-server XOR stream cipher.
//!
//! Self-synchronizing: each direction keeps its own 16-byte key vector
//! and rolling counter (bytes 8..12 of the key), but there is a single
//! shared "enabled" flag. The very first outbound packet after the
//! KeyPacket handshake passes through unencrypted and merely flips that
//! flag — mirroring the server's own first encrypt of the KeyPacket —
//! and that flip is what lets the first *inbound* packet start being
//! decrypted for real. Losing that one-packet passthrough desyncs every
//! packet that follows, since both counters drift out of lockstep.

use byteorder::{ByteOrder, LittleEndian};

pub const KEY_LEN: usize = 16;

#[derive(Clone)]
struct Direction {
    key: [u8; KEY_LEN],
    prev: u8,
}

impl Direction {
    fn new(xor_key: &[u8; KEY_LEN]) -> Self {
        Self {
            key: *xor_key,
            prev: 0,
        }
    }

    fn advance_counter(&mut self, len: usize) {
        let counter = LittleEndian::read_u32(&self.key[8..12]);
        LittleEndian::write_u32(&mut self.key[8..12], counter.wrapping_add(len as u32));
    }
}

/// Per-session XOR cipher state.
pub struct GameCipher {
    out: Direction,
    in_: Direction,
    enabled: bool,
}

impl GameCipher {
    /// Builds cipher state from the 16-byte key delivered in the game
    /// server's KeyPacket. `force_enabled` should be `true` when the
    /// caller already knows the server performed its own first-encrypt
    /// passthrough — true for clients, since the KeyPacket itself arrived
    /// unencrypted and the server immediately expects the client's first
    /// outbound packet to be fully XOR-encrypted.
    pub fn new(xor_key: [u8; KEY_LEN], force_enabled: bool) -> Self {
        Self {
            out: Direction::new(&xor_key),
            in_: Direction::new(&xor_key),
            enabled: force_enabled,
        }
    }

    /// Encrypts `data` in place. The first call after construction (unless
    /// `force_enabled` was set) passes through unchanged and only flips
    /// the shared enabled flag.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        if !self.enabled {
            self.enabled = true;
            return;
        }

        let mut prev = self.out.prev;
        for (i, byte) in data.iter_mut().enumerate() {
            let out = *byte ^ self.out.key[i % KEY_LEN] ^ prev;
            prev = out;
            *byte = out;
        }
        self.out.prev = prev;
        self.out.advance_counter(data.len());
    }

    /// Decrypts `data` in place. While the shared enabled flag is still
    /// false, this is a passthrough; the flag only flips via [`Self::encrypt`].
    pub fn decrypt(&mut self, data: &mut [u8]) {
        if !self.enabled {
            return;
        }

        let mut prev = self.in_.prev;
        for (i, byte) in data.iter_mut().enumerate() {
            let ciphertext_byte = *byte;
            *byte = ciphertext_byte ^ self.in_.key[i % KEY_LEN] ^ prev;
            prev = ciphertext_byte;
        }
        self.in_.prev = prev;
        self.in_.advance_counter(data.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_decrypt_before_enable_is_passthrough() {
        let mut cipher = GameCipher::new([0x11; KEY_LEN], false);
        let mut data = b"hello world".to_vec();
        let original = data.clone();

        cipher.decrypt(&mut data);

        assert_eq!(data, original);
    }

    #[test]
    fn first_encrypt_is_passthrough_and_enables_decrypt() {
        let mut cipher = GameCipher::new([0x22; KEY_LEN], false);
        let mut data = b"login".to_vec();
        let original = data.clone();

        cipher.encrypt(&mut data);
        assert_eq!(data, original);

        let mut inbound = b"world".to_vec();
        let inbound_plain = inbound.clone();
        cipher.decrypt(&mut inbound);
        assert_ne!(inbound, inbound_plain);
    }

    #[test]
    fn forced_enabled_encrypts_first_packet_for_real() {
        let mut cipher = GameCipher::new([0x33; KEY_LEN], true);
        let mut data = b"request".to_vec();
        let original = data.clone();

        cipher.encrypt(&mut data);

        assert_ne!(data, original);
    }

    #[test]
    fn encrypt_then_decrypt_round_trips_a_stream_of_packets() {
        // Mirrors `GameSession::connect`'s real construction: the server
        // side starts unenabled and uses its own first encrypt call (the
        // KeyPacket send) as the passthrough that flips it on; the client
        // is constructed already-enabled, since by the time it builds its
        // cipher that server-side flip has already happened.
        let mut server = GameCipher::new([0x44; KEY_LEN], false);
        let mut client = GameCipher::new([0x44; KEY_LEN], true);

        let mut key_packet = b"KEYPACKET0".to_vec();
        let key_packet_plain = key_packet.clone();
        server.encrypt(&mut key_packet);
        assert_eq!(key_packet, key_packet_plain);

        // Client's first outbound is genuinely encrypted; the server, now
        // enabled by its own KeyPacket passthrough, decrypts it for real.
        let mut first = b"AUTH_LOGIN".to_vec();
        let first_plain = first.clone();
        client.encrypt(&mut first);
        assert_ne!(first, first_plain);
        server.decrypt(&mut first);
        assert_eq!(first, first_plain);

        // Server's reply is genuinely encrypted too; the client, already
        // enabled from construction, decrypts it for real.
        let mut reply = b"CHAR_SELECT_INFO".to_vec();
        let reply_plain = reply.clone();
        server.encrypt(&mut reply);
        assert_ne!(reply, reply_plain);
        client.decrypt(&mut reply);
        assert_eq!(reply, reply_plain);

        // Subsequent packets in both directions keep advancing in lockstep.
        let mut second = b"ENTER_WORLD".to_vec();
        let second_plain = second.clone();
        client.encrypt(&mut second);
        assert_ne!(second, second_plain);
        server.decrypt(&mut second);
        assert_eq!(second, second_plain);
    }
}
