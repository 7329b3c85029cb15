//! Login-server handshake: a strict sequence of states from the initial
//! TCP connect through server selection. Any unexpected opcode aborts the
//! session immediately — there is no recovery within a handshake.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use geo_crypto::blowfish::{Blowfish, STATIC_INIT_KEY};
use geo_crypto::{login_xor, rsa};

use crate::framing::{read_frame, write_frame};
use crate::ProtocolError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const OP_INIT: u8 = 0x00;
const OP_GG_AUTH_REQUEST: u8 = 0x07;
const OP_GG_AUTH_OK: u8 = 0x0B;
const OP_AUTH_LOGIN_REQUEST: u8 = 0x00;
const OP_LOGIN_FAIL: u8 = 0x01;
const OP_LOGIN_OK: u8 = 0x03;
const OP_SERVER_LIST_REQUEST: u8 = 0x05;
const OP_SERVER_LIST: u8 = 0x04;
const OP_SELECT_SERVER: u8 = 0x02;
const OP_PLAY_FAIL: u8 = 0x06;
const OP_PLAY_OK: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameServerEntry {
    pub id: u8,
    pub ip: [u8; 4],
    pub port: u32,
    pub current_players: u16,
    pub max_players: u16,
    pub status_up: bool,
}

/// Everything a caller needs to proceed to the game server handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginKeys {
    pub login_key1: u32,
    pub login_key2: u32,
    pub play_key1: u32,
    pub play_key2: u32,
}

pub struct LoginSession {
    stream: TcpStream,
    blowfish: Blowfish,
    session_id: u32,
}

impl LoginSession {
    /// Opens the TCP connection and completes the Init handshake, leaving
    /// the session ready to send AuthGameGuard.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<(Self, Vec<u8>), ProtocolError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
        stream.set_write_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut stream = stream;
        let mut raw = read_frame(&mut stream)?;

        let static_bf = Blowfish::new(&STATIC_INIT_KEY)?;
        static_bf.decrypt(&mut raw)?;
        login_xor::reverse_xor_pass(&mut raw)?;

        if raw.is_empty() || raw[0] != OP_INIT {
            return Err(ProtocolError::UnexpectedOpcode {
                state: "RecvInit",
                opcode: raw.first().copied().unwrap_or(0xFF),
            });
        }
        if raw.len() < 153 + 16 {
            return Err(ProtocolError::Truncated);
        }

        let session_id = LittleEndian::read_u32(&raw[1..5]);
        let scrambled_modulus: [u8; rsa::MODULUS_LEN] = raw[9..9 + rsa::MODULUS_LEN]
            .try_into()
            .map_err(|_| ProtocolError::Truncated)?;
        let dynamic_key = raw[153..153 + 16].to_vec();

        let modulus = rsa::descramble_modulus(&scrambled_modulus);
        let blowfish = Blowfish::new(&dynamic_key)?;

        let session = Self {
            stream,
            blowfish,
            session_id,
        };

        Ok((session, modulus.to_vec()))
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let mut framed = login_xor::frame_for_encryption(payload);
        self.blowfish.encrypt(&mut framed)?;
        write_frame(&mut self.stream, &framed)
    }

    fn recv(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut body = read_frame(&mut self.stream)?;
        self.blowfish.decrypt(&mut body)?;
        Ok(body)
    }

    /// GGAuth: sends AuthGameGuard and expects the server's GGAuth ack.
    pub fn gg_auth(&mut self) -> Result<(), ProtocolError> {
        let mut pkt = vec![OP_GG_AUTH_REQUEST];
        pkt.write_u32::<LittleEndian>(self.session_id)?;
        pkt.extend_from_slice(&[0u8; 16]);
        self.send(&pkt)?;

        let raw = self.recv()?;
        if raw.first().copied() != Some(OP_GG_AUTH_OK) {
            return Err(ProtocolError::UnexpectedOpcode {
                state: "GGAuth",
                opcode: raw.first().copied().unwrap_or(0xFF),
            });
        }
        Ok(())
    }

    /// AuthLogin: RSA-encrypts credentials against the descrambled modulus
    /// and returns the login key pair on success.
    pub fn auth_login(
        &mut self,
        modulus: &[u8; rsa::MODULUS_LEN],
        username: &str,
        password: &str,
    ) -> Result<(u32, u32), ProtocolError> {
        let ciphertext = rsa::rsa_encrypt_credentials(modulus, username, password)?;
        let mut pkt = vec![OP_AUTH_LOGIN_REQUEST];
        pkt.extend_from_slice(&ciphertext);
        self.send(&pkt)?;

        let raw = self.recv()?;
        match raw.first().copied() {
            Some(OP_LOGIN_FAIL) => {
                let reason = raw
                    .get(1..5)
                    .map(LittleEndian::read_u32)
                    .unwrap_or_default();
                Err(ProtocolError::LoginFailed(reason))
            }
            Some(OP_LOGIN_OK) => {
                if raw.len() < 9 {
                    return Err(ProtocolError::Truncated);
                }
                let key1 = LittleEndian::read_u32(&raw[1..5]);
                let key2 = LittleEndian::read_u32(&raw[5..9]);
                Ok((key1, key2))
            }
            other => Err(ProtocolError::UnexpectedOpcode {
                state: "AuthLogin",
                opcode: other.unwrap_or(0xFF),
            }),
        }
    }

    /// ServerList: requests and parses the available game server entries.
    pub fn server_list(&mut self, login_key1: u32, login_key2: u32) -> Result<Vec<GameServerEntry>, ProtocolError> {
        let mut pkt = vec![OP_SERVER_LIST_REQUEST];
        pkt.write_u32::<LittleEndian>(login_key1)?;
        pkt.write_u32::<LittleEndian>(login_key2)?;
        self.send(&pkt)?;

        let raw = self.recv()?;
        if raw.first().copied() != Some(OP_SERVER_LIST) {
            return Err(ProtocolError::UnexpectedOpcode {
                state: "ServerList",
                opcode: raw.first().copied().unwrap_or(0xFF),
            });
        }
        let count = *raw.get(1).ok_or(ProtocolError::Truncated)? as usize;

        let mut servers = Vec::with_capacity(count);
        let mut offset = 3usize;
        for _ in 0..count {
            let entry = raw.get(offset..offset + 21).ok_or(ProtocolError::Truncated)?;
            servers.push(GameServerEntry {
                id: entry[0],
                ip: [entry[1], entry[2], entry[3], entry[4]],
                port: LittleEndian::read_u32(&entry[5..9]),
                current_players: LittleEndian::read_u16(&entry[11..13]),
                max_players: LittleEndian::read_u16(&entry[13..15]),
                status_up: entry[15] == 1,
            });
            offset += 21;
        }
        Ok(servers)
    }

    /// SelectServer: picks a server and returns the play key pair, or
    /// `Ok(None)` if the server explicitly signaled PlayFail.
    pub fn select_server(
        &mut self,
        login_key1: u32,
        login_key2: u32,
        server_id: u8,
    ) -> Result<(u32, u32), ProtocolError> {
        let mut pkt = vec![OP_SELECT_SERVER];
        pkt.write_u32::<LittleEndian>(login_key1)?;
        pkt.write_u32::<LittleEndian>(login_key2)?;
        pkt.push(server_id);
        self.send(&pkt)?;

        let raw = self.recv()?;
        match raw.first().copied() {
            Some(OP_PLAY_FAIL) => {
                let reason = raw.get(1).copied().unwrap_or(0);
                Err(ProtocolError::PlayFailed(reason))
            }
            Some(OP_PLAY_OK) => {
                if raw.len() < 9 {
                    return Err(ProtocolError::Truncated);
                }
                let key1 = LittleEndian::read_u32(&raw[1..5]);
                let key2 = LittleEndian::read_u32(&raw[5..9]);
                Ok((key1, key2))
            }
            other => Err(ProtocolError::UnexpectedOpcode {
                state: "SelectServer",
                opcode: other.unwrap_or(0xFF),
            }),
        }
    }
}

/// Runs the full login handshake end to end, picking the first server
/// returned by the server list. Returns the key material and address the
/// game server handshake needs.
pub fn run_login_handshake(
    addr: impl ToSocketAddrs,
    username: &str,
    password: &str,
) -> Result<(LoginKeys, GameServerEntry), ProtocolError> {
    let (mut session, modulus) = LoginSession::connect(addr)?;
    session.gg_auth()?;

    let modulus: [u8; rsa::MODULUS_LEN] = modulus.try_into().map_err(|_| ProtocolError::Truncated)?;
    let (login_key1, login_key2) = session.auth_login(&modulus, username, password)?;

    let servers = session.server_list(login_key1, login_key2)?;
    let server = servers
        .into_iter()
        .find(|s| s.status_up)
        .ok_or(ProtocolError::NoServersAvailable)?;

    let (play_key1, play_key2) = session.select_server(login_key1, login_key2, server.id)?;

    Ok((
        LoginKeys {
            login_key1,
            login_key2,
            play_key1,
            play_key2,
        },
        server,
    ))
}
