//! # Optimistic Sends
//!
//! Ledger of messages that were appended to the cache before the store
//! confirmed them. Entries are keyed by the message's correlation token.
//!
//! ## Features
//!
//! - **Immediate UI Updates**: the message is rendered before the write lands
//! - **Failure Tracking**: failed writes stay in the ledger for retry
//! - **Echo Matching**: the token travels with the document, so the store's
//!   echo can be matched back to the optimistic entry
//!
//! ## Usage
//!
//! ```rust
//! use schoolchat::client::offline::OptimisticLedger;
//! use schoolchat::shared::messaging::ChatMessage;
//!
//! let mut ledger = OptimisticLedger::new();
//! let message = ChatMessage::new_text("c1", "u1", "hello");
//! let token = ledger.track(&message).unwrap();
//! assert_eq!(ledger.len(), 1);
//! ledger.confirm(&token, "store-id");
//! assert!(ledger.is_empty());
//! ```

use std::collections::HashMap;

use crate::shared::messaging::ChatMessage;

/// Where a pending send stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    InFlight,
    Failed,
}

/// A message waiting on its write
#[derive(Debug, Clone)]
pub struct PendingSend {
    /// The optimistic cache entry as first appended
    pub message: ChatMessage,
    pub state: PendingState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Pending optimistic sends keyed by correlation token
#[derive(Debug, Default)]
pub struct OptimisticLedger {
    pending: HashMap<String, PendingSend>,
}

impl OptimisticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a message. Returns its token, or `None` if the message
    /// has no correlation token.
    pub fn track(&mut self, message: &ChatMessage) -> Option<String> {
        let token = message.client_token.clone()?;
        self.pending.insert(
            token.clone(),
            PendingSend {
                message: message.clone(),
                state: PendingState::InFlight,
                attempts: 1,
                last_error: None,
            },
        );
        Some(token)
    }

    pub fn get(&self, token: &str) -> Option<&PendingSend> {
        self.pending.get(token)
    }

    /// The write landed; the entry is done
    pub fn confirm(&mut self, token: &str, store_id: &str) -> Option<PendingSend> {
        let entry = self.pending.remove(token);
        if entry.is_some() {
            tracing::debug!("[OPTIMISTIC] Confirmed {} as {}", token, store_id);
        }
        entry
    }

    /// The write failed
    pub fn fail(&mut self, token: &str, error: impl Into<String>) -> Option<&PendingSend> {
        let entry = self.pending.get_mut(token)?;
        entry.state = PendingState::Failed;
        entry.last_error = Some(error.into());
        Some(&*entry)
    }

    /// Move a failed entry back in flight and return what to write
    pub fn begin_retry(&mut self, token: &str) -> Option<&PendingSend> {
        let entry = self.pending.get_mut(token)?;
        if entry.state != PendingState::Failed {
            return None;
        }
        entry.state = PendingState::InFlight;
        entry.attempts += 1;
        Some(&*entry)
    }

    /// Token of the entry whose optimistic message has `local_id`
    pub fn token_for(&self, conversation_id: &str, local_id: &str) -> Option<String> {
        self.pending
            .iter()
            .find(|(_, p)| p.message.conversation_id == conversation_id && p.message.id == local_id)
            .map(|(token, _)| token.clone())
    }

    /// Entries of one conversation
    pub fn pending_for(&self, conversation_id: &str) -> Vec<&PendingSend> {
        self.pending
            .values()
            .filter(|p| p.message.conversation_id == conversation_id)
            .collect()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::info!("[OPTIMISTIC] Dropping {} pending sends", self.pending.len());
        }
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
