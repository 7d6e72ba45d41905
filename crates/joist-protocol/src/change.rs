//! Change notification payloads.
//!
//! The database builds these payloads inside the notify trigger: for DELETE
//! the snapshot is the OLD row, otherwise the NEW row. Decoding is a pure
//! transform and never fails; a payload that does not parse as a change
//! record is wrapped as [`ChangeMessage::Raw`] so one malformed notification
//! cannot stall the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of row mutation, as reported by the database trigger (`TG_OP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    /// Lowercase label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A structured record of a single committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Table the mutation was committed against.
    pub table: String,
    /// What kind of mutation happened.
    pub action: ChangeAction,
    /// Primary key of the affected row.
    pub id: i64,
    /// Row snapshot (prior to deletion for DELETE, after the write otherwise).
    pub data: Value,
}

/// A decoded notification payload.
///
/// Serialized untagged, so the wire form is exactly `{table, action, id,
/// data}` for a structured record and `{raw}` for the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeMessage {
    Record(ChangeRecord),
    Raw { raw: String },
}

impl ChangeMessage {
    /// Decode a raw notification payload.
    ///
    /// One-shot and side-effect-free. A payload that is not a well-formed
    /// change record becomes `Raw { raw }` instead of an error.
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<ChangeRecord>(payload) {
            Ok(record) => Self::Record(record),
            Err(_) => Self::Raw {
                raw: payload.to_string(),
            },
        }
    }

    /// The structured record, if this payload decoded as one.
    pub fn record(&self) -> Option<&ChangeRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Raw { .. } => None,
        }
    }
}

/// A decoded change event, tagged with the channel it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub channel: String,
    pub message: ChangeMessage,
}

impl ChangeEvent {
    pub fn new(channel: impl Into<String>, message: ChangeMessage) -> Self {
        Self {
            channel: channel.into(),
            message,
        }
    }
}
