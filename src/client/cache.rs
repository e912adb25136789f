//! Local Cache Store
//!
//! In-memory view of conversation summaries and per-conversation message
//! lists. It is the render source for the UI and what gets written to the
//! fallback file.
//!
//! ## Invariants
//!
//! - message ids are unique within a conversation; the first write wins
//! - `list_messages` is ordered by timestamp, ties broken by insertion order
//! - readers always get owned copies

use std::collections::HashMap;

use crate::client::offline::fallback::FallbackSnapshot;
use crate::shared::messaging::{ChatMessage, Conversation, DeliveryStatus};

#[derive(Debug, Clone)]
struct CachedMessage {
    seq: u64,
    message: ChatMessage,
}

/// Conversation summaries plus ordered message lists
#[derive(Debug, Default)]
pub struct LocalCache {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<CachedMessage>>,
    next_seq: u64,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a summary by id
    pub fn upsert_conversation(&mut self, summary: Conversation) {
        self.conversations.insert(summary.id.clone(), summary);
    }

    /// Take a summary pushed by the store
    ///
    /// The unread counter is kept locally once a summary is known: it goes up
    /// by one when the store reports newer activity from someone other than
    /// `viewer_id`, and stays at zero while the conversation is open.
    pub fn merge_conversation(&mut self, mut summary: Conversation, viewer_id: &str, is_open: bool) {
        if let Some(cached) = self.conversations.get(&summary.id) {
            let newer = summary.last_message_at > cached.last_message_at;
            let from_other = summary
                .last_message_sender
                .as_deref()
                .is_some_and(|sender| sender != viewer_id);
            summary.unread_count = cached.unread_count;
            if newer && from_other && !is_open {
                summary.increment_unread();
            }
        }
        if is_open {
            summary.mark_read();
        }
        self.upsert_conversation(summary);
    }

    pub fn remove_conversation(&mut self, id: &str) -> bool {
        self.messages.remove(id);
        self.conversations.remove(id).is_some()
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Summaries, most recent activity first
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self.conversations.values().cloned().collect();
        list.sort_by(|a, b| {
            b.last_message_at
                .unwrap_or(i64::MIN)
                .cmp(&a.last_message_at.unwrap_or(i64::MIN))
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    /// Insert unless the conversation already holds a message with this id.
    /// Returns whether the message was inserted.
    pub fn append_message(&mut self, conversation_id: &str, message: ChatMessage) -> bool {
        let list = self.messages.entry(conversation_id.to_string()).or_default();
        if list.iter().any(|m| m.message.id == message.id) {
            return false;
        }
        list.push(CachedMessage {
            seq: self.next_seq,
            message,
        });
        self.next_seq += 1;
        true
    }

    /// Messages ordered by timestamp, stable by insertion
    pub fn list_messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let Some(list) = self.messages.get(conversation_id) else {
            return Vec::new();
        };
        let mut ordered: Vec<&CachedMessage> = list.iter().collect();
        ordered.sort_by_key(|m| (m.message.timestamp, m.seq));
        ordered.into_iter().map(|m| m.message.clone()).collect()
    }

    pub fn message(&self, conversation_id: &str, message_id: &str) -> Option<&ChatMessage> {
        self.messages
            .get(conversation_id)?
            .iter()
            .find(|m| m.message.id == message_id)
            .map(|m| &m.message)
    }

    /// Find a message by correlation token
    pub fn find_by_token(&self, conversation_id: &str, token: &str) -> Option<&ChatMessage> {
        self.messages
            .get(conversation_id)?
            .iter()
            .find(|m| m.message.client_token.as_deref() == Some(token))
            .map(|m| &m.message)
    }

    pub fn message_count(&self, conversation_id: &str) -> usize {
        self.messages.get(conversation_id).map_or(0, Vec::len)
    }

    /// Drop every message of a conversation
    pub fn clear_conversation(&mut self, conversation_id: &str) {
        if let Some(list) = self.messages.get_mut(conversation_id) {
            list.clear();
        }
    }

    /// Swap the entry `old_id` for `message`, keeping its insertion slot.
    /// Fails if `old_id` is missing or `message.id` belongs to another entry.
    pub fn replace_message(&mut self, conversation_id: &str, old_id: &str, message: ChatMessage) -> bool {
        let Some(list) = self.messages.get_mut(conversation_id) else {
            return false;
        };
        if message.id != old_id && list.iter().any(|m| m.message.id == message.id) {
            return false;
        }
        match list.iter_mut().find(|m| m.message.id == old_id) {
            Some(entry) => {
                entry.message = message;
                true
            }
            None => false,
        }
    }

    /// Give an entry its store id. When another entry already has `new_id`
    /// the `old_id` entry is dropped as a duplicate and `false` is returned.
    pub fn rekey_message(&mut self, conversation_id: &str, old_id: &str, new_id: &str) -> bool {
        let Some(list) = self.messages.get_mut(conversation_id) else {
            return false;
        };
        if list.iter().any(|m| m.message.id == new_id) {
            list.retain(|m| m.message.id != old_id);
            return false;
        }
        match list.iter_mut().find(|m| m.message.id == old_id) {
            Some(entry) => {
                entry.message.id = new_id.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_message(&mut self, conversation_id: &str, message_id: &str) -> bool {
        let Some(list) = self.messages.get_mut(conversation_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|m| m.message.id != message_id);
        list.len() != before
    }

    pub fn set_status(&mut self, conversation_id: &str, message_id: &str, status: DeliveryStatus) -> bool {
        let entry = self
            .messages
            .get_mut(conversation_id)
            .and_then(|list| list.iter_mut().find(|m| m.message.id == message_id));
        match entry {
            Some(entry) => {
                entry.message.status = status;
                true
            }
            None => false,
        }
    }

    /// Update a summary's preview and activity time from a message, and bump
    /// its unread counter when asked
    pub fn record_activity(
        &mut self,
        conversation_id: &str,
        message: &ChatMessage,
        preview_len: usize,
        count_unread: bool,
    ) {
        if let Some(summary) = self.conversations.get_mut(conversation_id) {
            summary.update_last_message(message, preview_len);
            if count_unread {
                summary.increment_unread();
            }
        }
    }

    pub fn mark_read(&mut self, conversation_id: &str) {
        if let Some(summary) = self.conversations.get_mut(conversation_id) {
            summary.mark_read();
        }
    }

    /// Contents in fallback-file form
    pub fn export(&self) -> FallbackSnapshot {
        let mut snapshot = FallbackSnapshot::default();
        for summary in self.conversations.values() {
            snapshot.insert_summary(summary.clone());
        }
        for (conversation_id, _) in self.messages.iter() {
            for message in self.list_messages(conversation_id) {
                match message.to_document() {
                    Ok(doc) => snapshot.push_message(conversation_id, doc),
                    Err(e) => tracing::warn!("[CACHE] Not exporting message {}: {}", message.id, e),
                }
            }
        }
        snapshot
    }

    /// Load a fallback snapshot; existing entries win
    pub fn import(&mut self, snapshot: &FallbackSnapshot) {
        for (id, entry) in &snapshot.conversations {
            if !self.conversations.contains_key(id) {
                let mut summary = entry.summary.clone();
                summary.id = id.clone();
                self.upsert_conversation(summary);
            }
            for doc in &entry.messages {
                match ChatMessage::from_document(doc) {
                    Ok(message) => {
                        self.append_message(id, message);
                    }
                    Err(e) => tracing::warn!("[CACHE] Skipping malformed message {}: {}", doc.id, e),
                }
            }
        }
    }
}
