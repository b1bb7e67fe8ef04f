use serde::{Deserialize, Serialize};

/// Sender of a message as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A chat message as carried in gateway payloads.
///
/// Field names follow the gateway's camelCase wire shape. `timestamp`
/// is an ISO-8601 string, so lexicographic order is chronological order
/// and message collections can be sorted on it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    pub sender: MessageSender,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_forwarded: bool,
    #[serde(default)]
    pub mentioned_ids: Vec<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}
