//! Conversation Data Structure
//!
//! Summary record for a conversation between two or more users, as kept in
//! the `conversations` collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::ChatMessage;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::Document;

/// Represents a conversation between users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Participant user IDs, in creation order
    pub participants: Vec<String>,
    /// Display name shown in the conversation list
    #[serde(default, rename = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form category (teacher, admin, user)
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    /// Preview text of last message
    #[serde(default, rename = "lastMessage")]
    pub last_message_preview: String,
    /// Timestamp of last activity in milliseconds
    #[serde(default, rename = "timestamp")]
    pub last_message_at: Option<i64>,
    /// Sender of the last message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_sender: Option<String>,
    /// Number of unread messages
    #[serde(default)]
    pub unread_count: u32,
}

fn default_kind() -> String {
    "user".to_string()
}

impl Conversation {
    /// Create a new conversation with no activity yet
    pub fn new(id: impl Into<String>, participants: Vec<String>) -> Self {
        Self {
            id: id.into(),
            participants,
            display_name: None,
            kind: default_kind(),
            last_message_preview: String::new(),
            last_message_at: None,
            last_message_sender: None,
            unread_count: 0,
        }
    }

    /// Create a new conversation between two users
    pub fn new_direct(id: impl Into<String>, user1: impl Into<String>, user2: impl Into<String>) -> Self {
        Self::new(id, vec![user1.into(), user2.into()])
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the category
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Check the two-participant minimum
    pub fn validate(&self) -> SyncResult<()> {
        if self.participants.len() < 2 {
            return Err(SyncError::invalid_input(
                "participants",
                "a conversation needs at least two participants",
            ));
        }
        Ok(())
    }

    /// Update the preview and activity time from a message
    pub fn update_last_message(&mut self, message: &ChatMessage, preview_len: usize) {
        self.last_message_preview = message.preview(preview_len);
        self.last_message_sender = Some(message.sender_id.clone());
        if self.last_message_at.map_or(true, |at| message.timestamp >= at) {
            self.last_message_at = Some(message.timestamp);
        }
    }

    /// Bump the unread counter
    pub fn increment_unread(&mut self) {
        self.unread_count = self.unread_count.saturating_add(1);
    }

    /// Reset the unread counter
    pub fn mark_read(&mut self) {
        self.unread_count = 0;
    }

    /// Check if user is a participant
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Parse a stored document
    pub fn from_document(doc: &Document) -> SyncResult<Self> {
        let mut conversation: Conversation = serde_json::from_value(doc.data.clone())?;
        conversation.id = doc.id.clone();
        Ok(conversation)
    }

    /// Document body for a write
    pub fn to_write_document(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Full document, used when persisting locally
    pub fn to_document(&self) -> SyncResult<Document> {
        Ok(Document {
            id: self.id.clone(),
            data: serde_json::to_value(self)?,
        })
    }
}
