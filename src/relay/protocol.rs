//! Relay wire messages
//!
//! Every WebSocket text frame is a JSON object `{"event": <name>, "data": <payload>}`.
//!
//! | event     | direction | payload               |
//! |-----------|-----------|-----------------------|
//! | `hello`   | c→s       | `{bundle,name,type}`  |
//! | `join`    | c→s       | bundle name           |
//! | `part`    | c→s       | bundle name (`leave`) |
//! | `message` | c→s       | `{bundle,event,data}` |
//! | `message` | s→c       | `{bundle,event,data}` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of client a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Panel,
    Graphic,
    Dashboard,
    System,
}

/// Identity announced by a client in its `hello`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub bundle: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ClientKind,
}

/// Payload of a client `message`; `bundle` and `event` are checked by the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Messages a client may send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    Hello(ClientIdentity),
    Join(String),
    #[serde(alias = "leave")]
    Part(String),
    Message(Envelope),
}

impl ClientMessage {
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// An event delivered to a client or in-process listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub bundle: String,
    pub event: String,
    pub data: Value,
}

/// Messages the relay sends to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    Message(Delivery),
}

impl ServerMessage {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
