use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Join = 0x01,
    Move = 0x02,

    // Server -> Client
    Welcome = 0x10,
    Update = 0x11,
    PlayerJoined = 0x12,
    PlayerLeft = 0x13,
    WorldGrew = 0x14,
    JoinError = 0x15,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::Move),
            0x10 => Some(Self::Welcome),
            0x11 => Some(Self::Update),
            0x12 => Some(Self::PlayerJoined),
            0x13 => Some(Self::PlayerLeft),
            0x14 => Some(Self::WorldGrew),
            0x15 => Some(Self::JoinError),
            _ => None,
        }
    }

    /// Whether only the server may send this message type.
    pub fn is_server_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinMsg),
    Move(MoveMsg),
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Welcome(WelcomeMsg),
    Update(UpdateMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    WorldGrew(WorldGrewMsg),
    JoinError(JoinErrorMsg),
}

/// First frame on every connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub player_name: String,
    pub protocol_version: u8,
}

/// A movement intent. The direction stays a string on the wire so that
/// unknown values decode cleanly and are dropped by the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveMsg {
    pub direction: String,
}

/// Sent only to the joining player. `world_data` is the simulation's
/// serialized welcome payload (full world plus every player).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMsg {
    pub player_id: PlayerId,
    pub tick: u64,
    pub world_data: Vec<u8>,
}

/// Per-tick snapshot broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMsg {
    pub tick: u64,
    pub state_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub player_id: PlayerId,
    pub player_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
}

/// Entities of one newly generated chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldGrewMsg {
    pub chunk_index: u32,
    pub chunk_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinErrorMsg {
    pub error: String,
}
