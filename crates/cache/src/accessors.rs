//! Typed accessors over fixed cache keys
//!
//! Key conventions for gateway data: singleton keys for the contact and
//! chat lists, one key per chat for its message collection, and a
//! short-lived pairing QR entry.

use std::time::Duration;

use hermes_core::{Chat, Contact, Message};

use crate::error::CacheError;
use crate::manager::CacheManager;

const CONTACTS_KEY: &str = "contacts";
const CHATS_KEY: &str = "chats";
const CHAT_MESSAGES_PREFIX: &str = "chat_messages:";
const QR_CODE_KEY: &str = "qr_code";

/// Pairing QR codes go stale quickly; capped at five minutes no matter
/// what the cache default is.
const QR_CODE_TTL: Duration = Duration::from_secs(300);

fn chat_messages_key(chat_id: &str) -> String {
    format!("{CHAT_MESSAGES_PREFIX}{chat_id}")
}

impl CacheManager {
    pub async fn get_contacts(&self) -> Result<Option<Vec<Contact>>, CacheError> {
        self.get(CONTACTS_KEY).await
    }

    pub async fn set_contacts(&self, contacts: &[Contact]) -> Result<(), CacheError> {
        self.set(CONTACTS_KEY, &contacts, None).await
    }

    pub async fn get_chats(&self) -> Result<Option<Vec<Chat>>, CacheError> {
        self.get(CHATS_KEY).await
    }

    pub async fn set_chats(&self, chats: &[Chat]) -> Result<(), CacheError> {
        self.set(CHATS_KEY, &chats, None).await
    }

    pub async fn get_chat_messages(
        &self,
        chat_id: &str,
    ) -> Result<Option<Vec<Message>>, CacheError> {
        self.get(&chat_messages_key(chat_id)).await
    }

    pub async fn set_chat_messages(
        &self,
        chat_id: &str,
        messages: &[Message],
    ) -> Result<(), CacheError> {
        self.set(&chat_messages_key(chat_id), &messages, None).await
    }

    /// Insert or update one message in a chat's collection.
    ///
    /// A message with a known id replaces the stored record in place; a
    /// new id is appended and the collection re-sorted newest-first.
    /// The read-modify-write runs under a dedicated lock so concurrent
    /// inserts for the same chat cannot overwrite each other.
    pub async fn add_chat_message(
        &self,
        chat_id: &str,
        message: Message,
    ) -> Result<(), CacheError> {
        let _guard = self.chat_update.lock().await;

        let mut messages = self.get_chat_messages(chat_id).await?.unwrap_or_default();

        if let Some(existing) = messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            messages.push(message);
            messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }

        self.set_chat_messages(chat_id, &messages).await
    }

    pub async fn get_qr_code(&self) -> Result<Option<String>, CacheError> {
        self.get(QR_CODE_KEY).await
    }

    pub async fn set_qr_code(&self, qr_code: &str) -> Result<(), CacheError> {
        self.set(QR_CODE_KEY, &qr_code, Some(QR_CODE_TTL)).await
    }
}
