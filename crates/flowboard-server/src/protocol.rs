//! Relay wire messages.
//!
//! ```json
//! { "type": "hello", "name": "Ada" }
//! { "type": "init", "yourId": "…", "users": [{ "id": "…", "name": "Ada" }], "board": { … } }
//! { "type": "presence", "users": [{ "id": "…", "name": "Ada" }] }
//! ```
//!
//! Accepted boards go out as bare JSON objects, byte-for-byte as written.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// A message from a client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce or change the display name
    Hello {
        #[serde(default)]
        name: String,
    },
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: String,
    pub name: String,
}

/// A message from the relay
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once to a new connection
    Init {
        #[serde(rename = "yourId")]
        your_id: String,
        users: Vec<PeerInfo>,
        board: Box<RawValue>,
    },
    /// Roster snapshot, broadcast on every join, rename and leave
    Presence { users: Vec<PeerInfo> },
}

/// Trim, truncate to 32 characters, default to `Anonymous`.
pub fn normalize_name(name: &str) -> String {
    let name: String = name.trim().chars().take(MAX_DISPLAY_NAME_LEN).collect();
    if name.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        name
    }
}
