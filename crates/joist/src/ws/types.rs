//! WebSocket message types.
//!
//! Change notifications go to the client exactly as decoded (`{table,
//! action, id, data}`, or `{raw}` for the malformed fallback); control
//! replies carry a `type` tag. The untagged outer enum keeps the change
//! wire format free of any envelope.

use serde::{Deserialize, Serialize};

use joist_protocol::ChangeMessage;

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Change(ChangeMessage),
    Control(ControlMessage),
}

/// Non-change control traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Reply to a client text frame.
    Echo { message: String },
}

impl ServerMessage {
    /// Wrap a decoded change notification.
    pub fn change(message: ChangeMessage) -> Self {
        Self::Change(message)
    }

    /// Echo reply for a client frame.
    pub fn echo(message: impl Into<String>) -> Self {
        Self::Control(ControlMessage::Echo {
            message: message.into(),
        })
    }
}
