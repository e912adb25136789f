//! Local-only store
//!
//! In-process [`DocumentStore`] used when the remote store cannot be reached
//! at startup. Behaves like the remote one (generated ids, stamped timestamps,
//! snapshot-then-delta subscriptions) so the controller does not care which
//! one it was given. State can be written back to the fallback file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::memory::{spawn_feed, MemoryCollections};
use super::{DocumentStore, StoreKind, StoreQuery, SubscriptionHandle};
use crate::client::offline::fallback::FallbackSnapshot;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::{Document, StoreEvent, SubscriptionId};
use crate::shared::messaging::{ChatMessage, Conversation, CONVERSATIONS_COLLECTION, MESSAGES_COLLECTION};

pub struct LocalOnlyStore {
    collections: Arc<MemoryCollections>,
    path: Option<PathBuf>,
}

impl LocalOnlyStore {
    pub fn new() -> Self {
        Self::with_path(None)
    }

    /// Empty store that persists to `path`
    pub fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            collections: Arc::new(MemoryCollections::new()),
            path,
        }
    }

    /// Store pre-populated from a fallback snapshot
    pub async fn from_snapshot(snapshot: &FallbackSnapshot, path: Option<PathBuf>) -> Self {
        let store = Self::with_path(path);
        let mut conversations = Vec::new();
        let mut messages = Vec::new();
        for (id, entry) in &snapshot.conversations {
            let mut summary = entry.summary.clone();
            summary.id = id.clone();
            match summary.to_document() {
                Ok(doc) => conversations.push(doc),
                Err(e) => tracing::warn!("[STORE] Skipping conversation {} from fallback: {}", id, e),
            }
            messages.extend(entry.messages.iter().cloned());
        }
        store.collections.load(CONVERSATIONS_COLLECTION, conversations).await;
        store.collections.load(MESSAGES_COLLECTION, messages).await;
        store
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub async fn is_empty(&self) -> bool {
        self.collections.is_empty().await
    }

    /// Insert documents with fixed ids (seeding)
    pub async fn load(&self, collection: &str, documents: Vec<Document>) {
        self.collections.load(collection, documents).await;
    }

    /// Current contents as a fallback snapshot
    pub async fn snapshot(&self) -> FallbackSnapshot {
        let mut snapshot = FallbackSnapshot::default();
        for doc in self.collections.dump(CONVERSATIONS_COLLECTION).await {
            match Conversation::from_document(&doc) {
                Ok(summary) => snapshot.insert_summary(summary),
                Err(e) => tracing::warn!("[STORE] Not saving malformed conversation {}: {}", doc.id, e),
            }
        }
        for doc in self.collections.dump(MESSAGES_COLLECTION).await {
            match ChatMessage::from_document(&doc) {
                Ok(message) => snapshot.push_message(&message.conversation_id, doc),
                Err(e) => tracing::warn!("[STORE] Not saving malformed message {}: {}", doc.id, e),
            }
        }
        snapshot
    }

    /// Write the current contents to the fallback file
    pub async fn persist(&self) -> SyncResult<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| SyncError::storage("no fallback path configured"))?;
        self.snapshot().await.save(path).await
    }
}

impl Default for LocalOnlyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for LocalOnlyStore {
    fn kind(&self) -> StoreKind {
        StoreKind::LocalOnly
    }

    async fn write(&self, collection: &str, document: Value) -> SyncResult<String> {
        let doc = self.collections.insert(collection, document).await?;
        tracing::debug!("[STORE] Local write {}/{}", collection, doc.id);
        Ok(doc.id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> SyncResult<()> {
        self.collections.update(collection, id, patch).await.map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> SyncResult<()> {
        self.collections.delete(collection, id).await.map(|_| ())
    }

    async fn query(&self, query: &StoreQuery) -> SyncResult<Vec<Document>> {
        Ok(self.collections.query(query).await)
    }

    async fn subscribe(
        &self,
        query: StoreQuery,
        sink: mpsc::UnboundedSender<StoreEvent>,
    ) -> SyncResult<SubscriptionHandle> {
        let id = SubscriptionId::new();
        let token = CancellationToken::new();
        tracing::debug!("[STORE] Local subscription {} on {}", id, query.collection);
        spawn_feed(self.collections.clone(), query, token.clone(), move |payload| {
            sink.send(StoreEvent {
                subscription: id,
                payload,
            })
            .is_ok()
        });
        Ok(SubscriptionHandle::new(id, token))
    }
}
