//! WebSocket message types: envelope, commands, and topics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a response to the command with id `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds a server-pushed event on `topic`.
    #[must_use]
    pub fn event(topic: Topic, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            timestamp: Utc::now(),
            payload: serde_json::json!({ "topic": topic, "data": data }),
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({ "code": code, "message": message }),
        }
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Event streams a client can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Full account snapshots after every commit.
    Account,
    /// Ledger events of the signed-in account.
    Transactions,
}

/// Commands that a client can send over WebSocket (the envelope payload).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Start following topics.
    Subscribe {
        /// Topics to add.
        topics: Vec<Topic>,
    },
    /// Stop following topics.
    Unsubscribe {
        /// Topics to remove.
        topics: Vec<Topic>,
    },
}
