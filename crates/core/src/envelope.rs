//! Wire envelopes
//!
//! Every frame on the gateway connection is a UTF-8 JSON object with a
//! `type` discriminator. Outbound traffic is always a command; inbound
//! traffic is a response or error correlated by id, or an uncorrelated
//! server event.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outbound command frame.
///
/// `timestamp` is always null on send; the gateway stamps it before
/// echoing the id back in its response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "command")]
pub struct CommandEnvelope {
    pub id: String,
    pub command: String,
    pub data: Value,
    pub timestamp: Option<String>,
}

impl CommandEnvelope {
    /// Build a command frame with a fresh correlation id.
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            command: command.into(),
            data,
            timestamp: None,
        }
    }
}

/// Inbound frames, discriminated on `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    Response(ResponseEnvelope),
    Error(ErrorEnvelope),
    Event(EventEnvelope),
}

/// Successful reply to a command, matched by correlation id.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Failed reply to a command, matched by correlation id.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub id: String,
    #[serde(default = "unknown_error")]
    pub error: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Unsolicited server push; no id correlation.
///
/// Event-specific fields (e.g. the `message` object on a `message`
/// event) are captured in `payload`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

fn unknown_error() -> String {
    "Unknown error".to_string()
}
