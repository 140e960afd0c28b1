//! Outbound Messages
//!
//! Every frame the server sends carries a `type` tag and an ISO-8601
//! `timestamp`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason sent with `disconnect_ack`.
pub const CLIENT_REQUESTED_DISCONNECT: &str = "client_requested_disconnect";

/// Messages sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Fresh open
    Welcome {
        count: u64,
        timestamp: DateTime<Utc>,
    },
    /// Open that resumed a persisted record
    Reconnection {
        #[serde(rename = "previousCount")]
        previous_count: u64,
        timestamp: DateTime<Utc>,
    },
    /// Periodic liveness ping, no reply expected
    Heartbeat { timestamp: DateTime<Utc> },
    /// Reply to a counted message
    MessageResponse {
        count: u64,
        timestamp: DateTime<Utc>,
    },
    /// Reply to a disconnect control message
    DisconnectAck {
        total: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// Server-initiated close notice
    Shutdown {
        total: u64,
        reason: String,
        bye: bool,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn welcome() -> Self {
        Self::Welcome {
            count: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn reconnection(previous_count: u64) -> Self {
        Self::Reconnection {
            previous_count,
            timestamp: Utc::now(),
        }
    }

    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    pub fn message_response(count: u64) -> Self {
        Self::MessageResponse {
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn disconnect_ack(total: u64) -> Self {
        Self::DisconnectAck {
            total,
            reason: CLIENT_REQUESTED_DISCONNECT.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn shutdown(total: u64, reason: impl Into<String>) -> Self {
        Self::Shutdown {
            total,
            reason: reason.into(),
            bye: true,
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Reconnection { .. } => "reconnection",
            Self::Heartbeat { .. } => "heartbeat",
            Self::MessageResponse { .. } => "message_response",
            Self::DisconnectAck { .. } => "disconnect_ack",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}
