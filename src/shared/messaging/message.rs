//! Chat Message Data Structure
//!
//! Represents a message in a conversation, plus the mapping to and from the
//! JSON documents kept in the `messages` collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::Document;

/// Prefix of ids assigned before the store has seen a message
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Message payload, tagged by `type` in the stored document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text message
    Text { content: String },
    /// Uploaded file; `content` holds the download URL
    #[serde(rename_all = "camelCase")]
    File {
        content: String,
        file_name: String,
        mime_type: String,
    },
}

impl MessageBody {
    /// Text body
    pub fn text(content: impl Into<String>) -> Self {
        MessageBody::Text {
            content: content.into(),
        }
    }

    /// The text (or URL) carried by this body
    pub fn content(&self) -> &str {
        match self {
            MessageBody::Text { content } | MessageBody::File { content, .. } => content,
        }
    }

    /// Short human-readable label used for conversation previews
    pub fn summary(&self) -> String {
        match self {
            MessageBody::Text { content } => content.clone(),
            MessageBody::File { file_name, .. } => format!("📎 {}", file_name),
        }
    }
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Delivered,
    Read,
    /// Local only: the write never reached the store
    Failed,
}

/// Represents a chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Store-assigned id, or `local-<uuid>` until the write lands
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// User who sent the message
    pub sender_id: String,
    /// Display name of the sender at send time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message content
    #[serde(flatten)]
    pub body: MessageBody,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// Delivery status
    #[serde(default)]
    pub status: DeliveryStatus,
    /// Correlation token linking an optimistic entry to its store echo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

impl ChatMessage {
    /// Create a new locally-originated text message
    pub fn new_text(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new_local(conversation_id, sender_id, MessageBody::text(content))
    }

    /// Create a new locally-originated message with a fresh local id and
    /// correlation token
    pub fn new_local(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: MessageBody,
    ) -> Self {
        Self {
            id: format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            body,
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: DeliveryStatus::Sent,
            client_token: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Set the sender display name
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Whether the store has assigned this message's id yet
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        truncate_preview(&self.body.summary(), max_len)
    }

    /// Parse a stored document
    pub fn from_document(doc: &Document) -> SyncResult<Self> {
        let mut message: ChatMessage = serde_json::from_value(doc.data.clone())?;
        message.id = doc.id.clone();
        Ok(message)
    }

    /// Document body for a write. The timestamp is left null so the store
    /// stamps its own clock.
    pub fn to_write_document(&self) -> SyncResult<Value> {
        let mut value = serde_json::to_value(self)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| SyncError::serialization("message did not serialize to an object"))?;
        obj.insert("timestamp".to_string(), Value::Null);
        Ok(value)
    }

    /// Full document, used when persisting locally
    pub fn to_document(&self) -> SyncResult<Document> {
        Ok(Document {
            id: self.id.clone(),
            data: serde_json::to_value(self)?,
        })
    }
}

const ELLIPSIS: &str = "...";

/// Truncate to at most `max_len` characters, ending in `...` when shortened
/// and there is room for it
pub fn truncate_preview(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len <= ELLIPSIS.len() {
        return text.chars().take(max_len).collect();
    }
    let mut preview: String = text.chars().take(max_len - ELLIPSIS.len()).collect();
    preview.push_str(ELLIPSIS);
    preview
}
