use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, JoinErrorMsg, JoinMsg, MessageType, MoveMsg, PlayerJoinedMsg, PlayerLeftMsg,
    ServerMessage, UpdateMsg, WelcomeMsg, WorldGrewMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum size of a single client frame. Clients only send joins and intents.
///
/// Server frames have no cap: welcomes and snapshots carry the whole world,
/// which only grows.
pub const MAX_CLIENT_MESSAGE_SIZE: usize = 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge { size: usize, max: usize },
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload too large: {size} bytes (max {max})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let mut buf = Vec::with_capacity(1 + payload_bytes.len());
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Like [`encode_message`], but fails when the frame would exceed `max` bytes.
pub fn encode_message_capped<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
    max: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let buf = encode_message(msg_type, payload)?;
    if buf.len() > max {
        return Err(ProtocolError::PayloadTooLarge {
            size: buf.len(),
            max,
        });
    }
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format. Frames over
/// [`MAX_CLIENT_MESSAGE_SIZE`] are refused, since the server would drop them.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Join(m) => {
            encode_message_capped(MessageType::Join, m, MAX_CLIENT_MESSAGE_SIZE)
        },
        ClientMessage::Move(m) => {
            encode_message_capped(MessageType::Move, m, MAX_CLIENT_MESSAGE_SIZE)
        },
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::Welcome(m) => encode_message(MessageType::Welcome, m),
        ServerMessage::Update(m) => encode_message(MessageType::Update, m),
        ServerMessage::PlayerJoined(m) => encode_message(MessageType::PlayerJoined, m),
        ServerMessage::PlayerLeft(m) => encode_message(MessageType::PlayerLeft, m),
        ServerMessage::WorldGrew(m) => encode_message(MessageType::WorldGrew, m),
        ServerMessage::JoinError(m) => encode_message(MessageType::JoinError, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Join => Ok(ClientMessage::Join(decode_payload::<JoinMsg>(data)?)),
        MessageType::Move => Ok(ClientMessage::Move(decode_payload::<MoveMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Welcome => Ok(ServerMessage::Welcome(decode_payload::<WelcomeMsg>(data)?)),
        MessageType::Update => Ok(ServerMessage::Update(decode_payload::<UpdateMsg>(data)?)),
        MessageType::PlayerJoined => Ok(ServerMessage::PlayerJoined(decode_payload::<
            PlayerJoinedMsg,
        >(data)?)),
        MessageType::PlayerLeft => Ok(ServerMessage::PlayerLeft(decode_payload::<
            PlayerLeftMsg,
        >(data)?)),
        MessageType::WorldGrew => Ok(ServerMessage::WorldGrew(decode_payload::<WorldGrewMsg>(
            data,
        )?)),
        MessageType::JoinError => Ok(ServerMessage::JoinError(decode_payload::<JoinErrorMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
