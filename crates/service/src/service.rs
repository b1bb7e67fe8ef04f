//! Cache-backed gateway accessors

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use hermes_cache::{CacheError, CacheManager};
use hermes_client::{ClientError, GatewayClient};
use hermes_core::{Chat, Contact, Message};

/// Default bound on one command round trip.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// An unscoped message search visits at most this many chats.
const SEARCH_CHAT_LIMIT: usize = 10;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("gateway error: {0}")]
    Client(#[from] ClientError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The gateway replied with a payload we could not decode
    #[error("malformed gateway payload: {0}")]
    Decode(String),
}

/// Cache-backed facade over the gateway client.
///
/// Reads are served from the cache when possible; misses go to the
/// gateway and populate the cache on the way back.
pub struct GatewayService {
    client: Arc<GatewayClient>,
    cache: Arc<CacheManager>,
    command_timeout: Duration,
}

impl GatewayService {
    pub fn new(client: Arc<GatewayClient>, cache: Arc<CacheManager>) -> Self {
        GatewayService {
            client,
            cache,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Contacts, optionally filtered by a name/number substring.
    pub async fn get_contacts(&self, query: Option<&str>) -> Result<Vec<Contact>, ServiceError> {
        if let Some(contacts) = self.cache.get_contacts().await? {
            log::debug!("returning contacts from cache");
            return Ok(filter_contacts(contacts, query));
        }

        let response = self
            .client
            .send_command("getContacts", json!({}), self.command_timeout)
            .await?;
        let contacts: Vec<Contact> = decode_list(&response.data, "contacts")?;

        self.cache.set_contacts(&contacts).await?;
        Ok(filter_contacts(contacts, query))
    }

    /// Chats, optionally filtered by a name substring.
    pub async fn get_chats(&self, query: Option<&str>) -> Result<Vec<Chat>, ServiceError> {
        if let Some(chats) = self.cache.get_chats().await? {
            log::debug!("returning chats from cache");
            return Ok(filter_chats(chats, query));
        }

        let response = self
            .client
            .send_command("getChats", json!({}), self.command_timeout)
            .await?;
        let chats: Vec<Chat> = decode_list(&response.data, "chats")?;

        self.cache.set_chats(&chats).await?;
        Ok(filter_chats(chats, query))
    }

    /// Messages of one chat, optionally filtered by a content
    /// substring, newest first, at most `limit`.
    pub async fn get_chat_messages(
        &self,
        chat_id: &str,
        limit: usize,
        query: Option<&str>,
    ) -> Result<Vec<Message>, ServiceError> {
        if let Some(messages) = self.cache.get_chat_messages(chat_id).await? {
            log::debug!("returning messages for chat {chat_id} from cache");
            let mut messages = filter_messages(messages, query);
            messages.truncate(limit);
            return Ok(messages);
        }

        let response = self
            .client
            .send_command(
                "getChatMessages",
                json!({"chatId": chat_id, "limit": limit}),
                self.command_timeout,
            )
            .await?;
        let messages: Vec<Message> = decode_list(&response.data, "messages")?;

        self.cache.set_chat_messages(chat_id, &messages).await?;
        Ok(filter_messages(messages, query))
    }

    /// Send a text message; the sent message lands in its chat's cached
    /// collection.
    pub async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
    ) -> Result<Message, ServiceError> {
        let response = self
            .client
            .send_command(
                "sendMessage",
                json!({"chatId": chat_id, "content": content}),
                self.command_timeout,
            )
            .await?;

        let message = decode_message(&response.data)?;
        // The gateway's echo is authoritative about the chat id.
        self.cache
            .add_chat_message(&message.chat_id.clone(), message.clone())
            .await?;
        Ok(message)
    }

    /// Send a media attachment (base64 payload, passed through).
    pub async fn send_media(
        &self,
        chat_id: &str,
        media: &str,
        filename: &str,
        caption: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<Message, ServiceError> {
        let response = self
            .client
            .send_command(
                "sendMedia",
                json!({
                    "chatId": chat_id,
                    "media": media,
                    "filename": filename,
                    "caption": caption,
                    "mediaType": media_type,
                }),
                self.command_timeout,
            )
            .await?;

        let message = decode_message(&response.data)?;
        self.cache
            .add_chat_message(&message.chat_id.clone(), message.clone())
            .await?;
        Ok(message)
    }

    /// Search messages by content, newest first.
    ///
    /// Scoped to one chat when `chat_id` is given; otherwise fans out
    /// over at most [`SEARCH_CHAT_LIMIT`] chats with the limit split
    /// between them.
    pub async fn search_messages(
        &self,
        query: &str,
        chat_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>, ServiceError> {
        if let Some(chat_id) = chat_id {
            return self.get_chat_messages(chat_id, limit, Some(query)).await;
        }

        let chats = self.get_chats(None).await?;
        let per_chat = (limit / SEARCH_CHAT_LIMIT).max(1);

        let mut results = Vec::new();
        for chat in chats.iter().take(SEARCH_CHAT_LIMIT) {
            let messages = self
                .get_chat_messages(&chat.id, per_chat, Some(query))
                .await?;
            results.extend(messages);
        }

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);
        Ok(results)
    }
}

fn decode_list<T: DeserializeOwned>(data: &Value, field: &str) -> Result<Vec<T>, ServiceError> {
    match data.get(field) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ServiceError::Decode(format!("bad {field} payload: {e}"))),
        None => Ok(Vec::new()),
    }
}

fn decode_message(data: &Value) -> Result<Message, ServiceError> {
    let value = data
        .get("message")
        .ok_or_else(|| ServiceError::Decode("missing message in gateway response".to_string()))?;
    serde_json::from_value(value.clone())
        .map_err(|e| ServiceError::Decode(format!("bad message payload: {e}")))
}

fn filter_contacts(contacts: Vec<Contact>, query: Option<&str>) -> Vec<Contact> {
    let Some(query) = query else {
        return contacts;
    };
    let query = query.to_lowercase();
    contacts
        .into_iter()
        .filter(|c| {
            c.name.to_lowercase().contains(&query) || c.number.to_lowercase().contains(&query)
        })
        .collect()
}

fn filter_chats(chats: Vec<Chat>, query: Option<&str>) -> Vec<Chat> {
    let Some(query) = query else {
        return chats;
    };
    let query = query.to_lowercase();
    chats
        .into_iter()
        .filter(|c| c.name.to_lowercase().contains(&query))
        .collect()
}

fn filter_messages(messages: Vec<Message>, query: Option<&str>) -> Vec<Message> {
    let Some(query) = query else {
        return messages;
    };
    let query = query.to_lowercase();
    messages
        .into_iter()
        .filter(|m| m.content.to_lowercase().contains(&query))
        .collect()
}
