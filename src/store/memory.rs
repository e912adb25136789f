//! In-memory document collections
//!
//! The storage core behind both [`super::LocalOnlyStore`] and the backend
//! service. Documents are kept per collection in commit order, every commit is
//! fanned out over a `tokio::sync::broadcast` channel, and subscription feeds
//! are built on top of that channel.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::StoreQuery;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::{Document, DocumentChange, SubscriptionPayload};

/// Capacity of the commit fan-out channel
const CHANGE_CHANNEL_CAPACITY: usize = 1000;

/// Field the store stamps when a write leaves it null
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A change as committed to one collection
#[derive(Debug, Clone)]
pub struct CommittedChange {
    pub collection: String,
    pub change: DocumentChange,
}

#[derive(Debug, Default)]
struct CollectionState {
    collections: HashMap<String, Vec<Document>>,
    clock: i64,
}

impl CollectionState {
    /// Monotonic millisecond clock
    fn next_timestamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.clock = now.max(self.clock + 1);
        self.clock
    }

    fn stamp(&mut self, data: &mut Value) {
        if let Some(obj) = data.as_object_mut() {
            let needs_stamp = obj.get(TIMESTAMP_FIELD).map_or(true, Value::is_null);
            if needs_stamp {
                let ts = self.next_timestamp();
                obj.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
            }
        }
    }
}

/// Collections of JSON documents with change fan-out
pub struct MemoryCollections {
    state: RwLock<CollectionState>,
    changes: broadcast::Sender<CommittedChange>,
}

impl MemoryCollections {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(CollectionState::default()),
            changes,
        }
    }

    fn publish(&self, collection: &str, change: DocumentChange) {
        match self.changes.send(CommittedChange {
            collection: collection.to_string(),
            change,
        }) {
            Ok(count) => tracing::trace!("[STORE] Change fanned out to {} feeds", count),
            Err(_) => tracing::trace!("[STORE] No feeds for change in {}", collection),
        }
    }

    /// Insert a new document with a generated id
    pub async fn insert(&self, collection: &str, mut data: Value) -> SyncResult<Document> {
        if !data.is_object() {
            return Err(SyncError::invalid_input("document", "documents must be JSON objects"));
        }
        let mut state = self.state.write().await;
        state.stamp(&mut data);
        let doc = Document::new(Uuid::new_v4().simple().to_string(), data);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        self.publish(collection, DocumentChange::added(doc.clone()));
        Ok(doc)
    }

    /// Merge top-level fields of `patch` into a document
    pub async fn update(&self, collection: &str, id: &str, mut patch: Value) -> SyncResult<Document> {
        let Some(fields) = patch.as_object_mut() else {
            return Err(SyncError::invalid_input("patch", "patches must be JSON objects"));
        };
        let mut state = self.state.write().await;
        if fields.get(TIMESTAMP_FIELD).is_some_and(Value::is_null) {
            let ts = state.next_timestamp();
            fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
        }
        let fields = fields.clone();
        let doc = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| SyncError::not_found("document", id))?;
        if let Some(obj) = doc.data.as_object_mut() {
            obj.extend(fields);
        }
        let doc = doc.clone();
        self.publish(collection, DocumentChange::modified(doc.clone()));
        Ok(doc)
    }

    /// Remove a document
    pub async fn delete(&self, collection: &str, id: &str) -> SyncResult<Document> {
        let mut state = self.state.write().await;
        let docs = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| SyncError::not_found("document", id))?;
        let pos = docs
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| SyncError::not_found("document", id))?;
        let doc = docs.remove(pos);
        self.publish(collection, DocumentChange::removed(doc.clone()));
        Ok(doc)
    }

    /// Insert documents as-is, keeping their ids and timestamps. Existing ids
    /// are skipped. No changes are published.
    pub async fn load(&self, collection: &str, documents: Vec<Document>) {
        let mut state = self.state.write().await;
        let mut max_ts = state.clock;
        let docs = state.collections.entry(collection.to_string()).or_default();
        for doc in documents {
            if docs.iter().any(|d| d.id == doc.id) {
                continue;
            }
            if let Some(ts) = doc.field(TIMESTAMP_FIELD).and_then(Value::as_i64) {
                max_ts = max_ts.max(ts);
            }
            docs.push(doc);
        }
        state.clock = max_ts;
    }

    /// Matching documents in query order
    pub async fn query(&self, query: &StoreQuery) -> Vec<Document> {
        let state = self.state.read().await;
        Self::select(&state, query)
    }

    fn select(state: &CollectionState, query: &StoreQuery) -> Vec<Document> {
        let mut docs: Vec<Document> = state
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query.matches(&query.collection, d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        query.sort(&mut docs);
        docs
    }

    /// Snapshot plus a change receiver taken under the same lock, so no commit
    /// falls between the two
    pub async fn watch(&self, query: &StoreQuery) -> (Vec<Document>, broadcast::Receiver<CommittedChange>) {
        let state = self.state.read().await;
        let rx = self.changes.subscribe();
        (Self::select(&state, query), rx)
    }

    /// Every document of a collection in commit order
    pub async fn dump(&self, collection: &str) -> Vec<Document> {
        let state = self.state.read().await;
        state.collections.get(collection).cloned().unwrap_or_default()
    }

    /// Total number of documents
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.collections.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCollections {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a subscription feed until `token` is cancelled or `deliver` reports
/// the consumer is gone
///
/// Sends one snapshot first, then one `Changes` payload per matching commit.
/// If the feed falls behind the fan-out channel it resynchronizes with a fresh
/// snapshot.
pub fn spawn_feed<F>(
    collections: Arc<MemoryCollections>,
    query: StoreQuery,
    token: CancellationToken,
    mut deliver: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnMut(SubscriptionPayload) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let (documents, mut rx) = collections.watch(&query).await;
        if token.is_cancelled() || !deliver(SubscriptionPayload::Snapshot { documents }) {
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(committed) => {
                        if !query.matches(&committed.collection, &committed.change.document) {
                            continue;
                        }
                        if !deliver(SubscriptionPayload::Changes { changes: vec![committed.change] }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[STORE] Feed lagged by {} changes, resending snapshot", skipped);
                        let documents = collections.query(&query).await;
                        if !deliver(SubscriptionPayload::Snapshot { documents }) {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        tracing::debug!("[STORE] Feed for {} stopped", query.collection);
    })
}
