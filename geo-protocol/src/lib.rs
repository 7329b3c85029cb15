//! Login and game server protocol sessions over plain TCP: packet framing,
//! the two handshake state machines, and inbound opcode dispatch during a
//! scan session.

pub mod framing;
pub mod game;
pub mod login;
pub mod strings;

pub use game::GameSession;
pub use login::{run_login_handshake, LoginSession};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected opcode 0x{opcode:02X} in state {state}")]
    UnexpectedOpcode { state: &'static str, opcode: u8 },

    #[error("frame length {0} is too small to hold its own length prefix")]
    InvalidFrameLength(u16),

    #[error("payload of {0} bytes does not fit a u16 frame length")]
    FrameTooLarge(usize),

    #[error("packet body ended before an expected field")]
    Truncated,

    #[error("login failed, reason code {0}")]
    LoginFailed(u32),

    #[error("no up game servers were offered by the login server")]
    NoServersAvailable,

    #[error("play failed, reason code {0}")]
    PlayFailed(u8),

    #[error("game server rejected the KeyPacket, flag {0}")]
    KeyPacketRejected(u8),

    #[error("game server auth was rejected (ActionFailed)")]
    AuthRejected,

    #[error("character creation failed, reason code {0}")]
    CharCreateFailed(u32),

    #[error(transparent)]
    Crypto(#[from] geo_crypto::CryptoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
