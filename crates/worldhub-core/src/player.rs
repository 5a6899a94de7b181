use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque appearance/position payload. The hub replicates it verbatim to
/// peers and never interprets individual fields.
pub type StateBlob = Map<String, Value>;

/// Wire representation of one joined participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub zone: String,
    #[serde(flatten)]
    pub state: StateBlob,
}
