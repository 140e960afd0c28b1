//! Inbound Messages
//!
//! Message content is opaque to the server except for one reserved shape:
//! a JSON object carrying a `disconnect` marker, either `{"type": "disconnect"}`
//! or `{"disconnect": true}`.

use serde_json::Value;

/// Reserved control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Disconnect,
}

/// A message received from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Control(ControlMessage),
    Data(Value),
}

impl ClientMessage {
    /// Classify a text frame. Anything that is not the reserved control
    /// shape, including invalid JSON, is a countable data message.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) if is_disconnect(&value) => Self::Control(ControlMessage::Disconnect),
            Ok(value) => Self::Data(value),
            Err(_) => Self::Data(Value::String(text.to_string())),
        }
    }

    /// Binary frames are never control messages.
    pub fn from_binary(bytes: &[u8]) -> Self {
        Self::Data(serde_json::json!({ "binaryLength": bytes.len() }))
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Self::Control(_))
    }
}

fn is_disconnect(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    object.get("type").and_then(Value::as_str) == Some("disconnect")
        || object.get("disconnect").and_then(Value::as_bool) == Some(true)
}
