use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::messages::{ClientMessage, ServerMessage};

/// Maximum inbound frame size in bytes. Larger frames are dropped at the
/// transport layer without closing the connection.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    NotAnObject,
    MissingType,
    UnknownMessageType(String),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::NotAnObject => write!(f, "message is not a JSON object"),
            Self::MissingType => write!(f, "missing type field"),
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Wrap a payload in the `{ "type": ..., ...fields }` envelope.
fn encode_envelope<T: Serialize>(msg_type: &str, payload: &T) -> Result<String, ProtocolError> {
    let value =
        serde_json::to_value(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(ProtocolError::SerializeError(
            "payload is not a JSON object".to_string(),
        ));
    };
    map.insert("type".to_string(), Value::String(msg_type.to_string()));
    serde_json::to_string(&Value::Object(map))
        .map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a `ClientMessage` to a wire frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ClientMessage::JoinWorld(m) => encode_envelope(msg_type, m),
        ClientMessage::UpdatePlayer(m) => encode_envelope(msg_type, m),
        ClientMessage::ChatMessage(m) => encode_envelope(msg_type, m),
        ClientMessage::SwitchZone(m) => encode_envelope(msg_type, m),
        ClientMessage::LeaveWorld => Ok(format!("{{\"type\":\"{msg_type}\"}}")),
    }
}

/// Encode a `ServerMessage` to a wire frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ServerMessage::WorldList(m) | ServerMessage::WorldListUpdate(m) => {
            encode_envelope(msg_type, m)
        },
        ServerMessage::PlayerList(m) => encode_envelope(msg_type, m),
        ServerMessage::PlayerJoined(m) => encode_envelope(msg_type, m),
        ServerMessage::PlayerUpdate(m) => encode_envelope(msg_type, m),
        ServerMessage::ChatMessage(m) => encode_envelope(msg_type, m),
        ServerMessage::PlayerMoved(m) => encode_envelope(msg_type, m),
        ServerMessage::PlayerLeft(m) => encode_envelope(msg_type, m),
        ServerMessage::JoinRejected(m) => encode_envelope(msg_type, m),
    }
}

/// Split a frame into its `type` discriminator and remaining fields.
/// The tag is removed here so it can never leak into a flattened payload
/// blob and resurface under a different message kind on re-broadcast.
fn decode_envelope(text: &str) -> Result<(String, Map<String, Value>), ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(ProtocolError::NotAnObject);
    };
    let Some(Value::String(msg_type)) = map.remove("type") else {
        return Err(ProtocolError::MissingType);
    };
    Ok((msg_type, map))
}

fn payload<T: DeserializeOwned>(fields: Map<String, Value>) -> Result<T, ProtocolError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a wire frame into a `ClientMessage`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let (msg_type, fields) = decode_envelope(text)?;
    match msg_type.as_str() {
        "joinWorld" => Ok(ClientMessage::JoinWorld(payload(fields)?)),
        "updatePlayer" => Ok(ClientMessage::UpdatePlayer(payload(fields)?)),
        "chatMessage" => Ok(ClientMessage::ChatMessage(payload(fields)?)),
        "switchZone" => Ok(ClientMessage::SwitchZone(payload(fields)?)),
        "leaveWorld" => Ok(ClientMessage::LeaveWorld),
        _ => Err(ProtocolError::UnknownMessageType(msg_type)),
    }
}

/// Decode a wire frame into a `ServerMessage`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let (msg_type, fields) = decode_envelope(text)?;
    match msg_type.as_str() {
        "worldList" => Ok(ServerMessage::WorldList(payload(fields)?)),
        "worldListUpdate" => Ok(ServerMessage::WorldListUpdate(payload(fields)?)),
        "playerList" => Ok(ServerMessage::PlayerList(payload(fields)?)),
        "playerJoined" => Ok(ServerMessage::PlayerJoined(payload(fields)?)),
        "playerUpdate" => Ok(ServerMessage::PlayerUpdate(payload(fields)?)),
        "chatMessage" => Ok(ServerMessage::ChatMessage(payload(fields)?)),
        "playerMoved" => Ok(ServerMessage::PlayerMoved(payload(fields)?)),
        "playerLeft" => Ok(ServerMessage::PlayerLeft(payload(fields)?)),
        "joinRejected" => Ok(ServerMessage::JoinRejected(payload(fields)?)),
        _ => Err(ProtocolError::UnknownMessageType(msg_type)),
    }
}
