use serde::{Deserialize, Serialize};

use crate::player::{PlayerSnapshot, StateBlob};
use crate::world::WorldStatus;

/// Why a join attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// Requested path matches no registered world.
    NotFound,
    /// Handshake was missing the identity or named the wrong world.
    InvalidHandshake,
    /// World is at capacity. Joins beyond capacity are rejected, not queued.
    Full,
    /// The identity already has a live session in this world.
    DuplicateIdentity,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "world not found"),
            Self::InvalidHandshake => write!(f, "invalid handshake"),
            Self::Full => write!(f, "world is full"),
            Self::DuplicateIdentity => write!(f, "identity already has a live session"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server payloads
// ---------------------------------------------------------------------------

/// Handshake message: first frame on a world connection.
/// Appearance/position fields (`x`, `y`, `appearance`, ...) ride in the
/// flattened blob and are never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinWorldMsg {
    #[serde(rename = "worldId")]
    pub world_id: String,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(flatten)]
    pub state: StateBlob,
}

/// Overwrite of the sender's own appearance/position fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlayerMsg {
    #[serde(flatten)]
    pub state: StateBlob,
}

/// Chat text from a client. A supplied `userID` is ignored; the relay
/// always carries the session's authoritative identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSendMsg {
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub message: String,
}

/// Sub-zone change request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchZoneMsg {
    #[serde(rename = "zoneName")]
    pub zone_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinWorld(JoinWorldMsg),
    UpdatePlayer(UpdatePlayerMsg),
    ChatMessage(ChatSendMsg),
    SwitchZone(SwitchZoneMsg),
    LeaveWorld,
}

impl ClientMessage {
    /// Wire discriminator carried in the envelope's `type` field.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::JoinWorld(_) => "joinWorld",
            Self::UpdatePlayer(_) => "updatePlayer",
            Self::ChatMessage(_) => "chatMessage",
            Self::SwitchZone(_) => "switchZone",
            Self::LeaveWorld => "leaveWorld",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client payloads
// ---------------------------------------------------------------------------

/// Full catalog snapshot: `worldList` on lobby connect,
/// `worldListUpdate` on every membership change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldListMsg {
    pub worlds: Vec<WorldStatus>,
}

/// Membership snapshot sent to a joiner, excluding the joiner itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerListMsg {
    pub players: Vec<PlayerSnapshot>,
}

/// State delta relayed to everyone but the originator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdateMsg {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(flatten)]
    pub state: StateBlob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBroadcastMsg {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMovedMsg {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "zoneName")]
    pub zone_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// Terminal answer to a failed join; the connection closes after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRejectedMsg {
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    WorldList(WorldListMsg),
    WorldListUpdate(WorldListMsg),
    PlayerList(PlayerListMsg),
    PlayerJoined(PlayerSnapshot),
    PlayerUpdate(PlayerUpdateMsg),
    ChatMessage(ChatBroadcastMsg),
    PlayerMoved(PlayerMovedMsg),
    PlayerLeft(PlayerLeftMsg),
    JoinRejected(JoinRejectedMsg),
}

impl ServerMessage {
    /// Wire discriminator carried in the envelope's `type` field.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::WorldList(_) => "worldList",
            Self::WorldListUpdate(_) => "worldListUpdate",
            Self::PlayerList(_) => "playerList",
            Self::PlayerJoined(_) => "playerJoined",
            Self::PlayerUpdate(_) => "playerUpdate",
            Self::ChatMessage(_) => "chatMessage",
            Self::PlayerMoved(_) => "playerMoved",
            Self::PlayerLeft(_) => "playerLeft",
            Self::JoinRejected(_) => "joinRejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_serializes_camel_case() {
        let json = serde_json::to_string(&RejectReason::DuplicateIdentity).unwrap();
        assert_eq!(json, "\"duplicateIdentity\"");
        let json = serde_json::to_string(&RejectReason::NotFound).unwrap();
        assert_eq!(json, "\"notFound\"");
    }

    #[test]
    fn join_world_accepts_missing_user_id() {
        let msg: JoinWorldMsg = serde_json::from_value(serde_json::json!({
            "worldId": "fireplane",
            "x": 1,
        }))
        .unwrap();
        assert_eq!(msg.user_id, None);
        assert_eq!(msg.state["x"], 1);
    }
}
