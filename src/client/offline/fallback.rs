//! # Fallback File
//!
//! Flat JSON file mapping conversation id to its summary and messages. It is
//! read at startup when the remote store cannot be reached and written on
//! demand from either the local store or the cache.
//!
//! ```json
//! {
//!   "conv_1700000000000": {
//!     "summary": { "participants": ["u1", "u2"], "lastMessage": "hi", ... },
//!     "messages": [ { "id": "m1", "data": { "content": "hi", ... } } ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::error::SyncResult;
use crate::shared::event::Document;
use crate::shared::messaging::Conversation;

/// Default location: `<data dir>/schoolchat/fallback.json`
pub fn default_fallback_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("schoolchat").join("fallback.json"))
}

/// One conversation in the fallback file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEntry {
    pub summary: Conversation,
    #[serde(default)]
    pub messages: Vec<Document>,
}

/// Contents of the fallback file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackSnapshot {
    pub conversations: BTreeMap<String, FallbackEntry>,
}

impl FallbackSnapshot {
    /// Add or replace a conversation summary, keeping any messages
    pub fn insert_summary(&mut self, summary: Conversation) {
        match self.conversations.get_mut(&summary.id) {
            Some(entry) => entry.summary = summary,
            None => {
                self.conversations.insert(
                    summary.id.clone(),
                    FallbackEntry {
                        summary,
                        messages: Vec::new(),
                    },
                );
            }
        }
    }

    /// Append a message document, creating a bare summary when needed
    pub fn push_message(&mut self, conversation_id: &str, doc: Document) {
        self.conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| FallbackEntry {
                summary: Conversation::new(conversation_id, Vec::new()),
                messages: Vec::new(),
            })
            .messages
            .push(doc);
    }

    pub fn message_count(&self) -> usize {
        self.conversations.values().map(|e| e.messages.len()).sum()
    }

    /// Read the file; `Ok(None)` when it does not exist
    pub async fn load(path: &Path) -> SyncResult<Option<Self>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the file, creating parent directories
    pub async fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::info!(
            "[FALLBACK] Saved {} conversations / {} messages to {}",
            self.conversations.len(),
            self.message_count(),
            path.display()
        );
        Ok(())
    }
}
