//! Document Store
//!
//! The store the synchronization layer reads from and writes to. There is one
//! interface, [`DocumentStore`], with two variants chosen once at startup:
//!
//! - [`RemoteBackedStore`] talks HTTP to a document-store service
//! - [`LocalOnlyStore`] keeps everything in process (offline fallback, demo)
//!
//! ## Subscriptions
//!
//! `subscribe` returns a [`SubscriptionHandle`] and pushes [`StoreEvent`]s into
//! the caller's channel. The first event is a snapshot of every matching
//! document in query order; later events carry deltas in commit order. Every
//! event is tagged with the handle's id so consumers can drop deliveries from
//! subscriptions they already cancelled.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use schoolchat::shared::AppConfig;
//! use schoolchat::store::open_store;
//!
//! # async fn run() {
//! let config = AppConfig::default();
//! let opened = open_store(&config, Some("student1")).await;
//! println!("using {:?} store", opened.store.kind());
//! # }
//! ```

pub mod local;
pub mod memory;
pub mod objects;
pub mod remote;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::demo;
use crate::client::offline::fallback::{default_fallback_path, FallbackSnapshot};
use crate::shared::config::AppConfig;
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::{Document, StoreEvent, SubscriptionId};
use crate::shared::messaging::{CONVERSATIONS_COLLECTION, MESSAGES_COLLECTION};

pub use local::LocalOnlyStore;
pub use memory::MemoryCollections;
pub use objects::{validate_attachment, MemoryObjectStorage, ObjectStorage};
pub use remote::RemoteBackedStore;

/// Which variant is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Remote,
    LocalOnly,
}

/// Field predicate applied by queries and subscriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldFilter {
    /// `field == value`
    Equals { field: String, value: Value },
    /// `field` is an array containing `value`
    ArrayContains { field: String, value: Value },
}

impl FieldFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            FieldFilter::Equals { field, value } => doc.field(field) == Some(value),
            FieldFilter::ArrayContains { field, value } => doc
                .field(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// A collection query: optional filter, optional ascending order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreQuery {
    pub collection: String,
    #[serde(default)]
    pub filter: Option<FieldFilter>,
    #[serde(default)]
    pub order_by: Option<String>,
}

impl StoreQuery {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            order_by: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(FieldFilter::Equals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(FieldFilter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Messages of one conversation, oldest first
    pub fn messages_of(conversation_id: &str) -> Self {
        Self::collection(MESSAGES_COLLECTION)
            .where_eq("conversationId", conversation_id)
            .order_by("timestamp")
    }

    /// Conversations a user participates in
    pub fn conversations_of(user_id: &str) -> Self {
        Self::collection(CONVERSATIONS_COLLECTION).where_array_contains("participants", user_id)
    }

    pub fn matches(&self, collection: &str, doc: &Document) -> bool {
        self.collection == collection && self.filter.as_ref().map_or(true, |f| f.matches(doc))
    }

    /// Stable sort by the order field; documents missing it go last
    pub fn sort(&self, docs: &mut [Document]) {
        if let Some(field) = &self.order_by {
            docs.sort_by(|a, b| compare_values(a.field(field), b.field(field)));
        }
    }
}

/// Query-string form of a [`StoreQuery`] used by the HTTP transport
///
/// `value` carries the filter value JSON-encoded so numbers and strings
/// survive the trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "orderBy", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl QueryParams {
    pub fn from_query(query: &StoreQuery) -> Self {
        let (field, op, value) = match &query.filter {
            Some(FieldFilter::Equals { field, value }) => (Some(field.clone()), Some("eq"), Some(value.to_string())),
            Some(FieldFilter::ArrayContains { field, value }) => {
                (Some(field.clone()), Some("array_contains"), Some(value.to_string()))
            }
            None => (None, None, None),
        };
        Self {
            field,
            op: op.map(str::to_string),
            value,
            order_by: query.order_by.clone(),
        }
    }

    pub fn into_query(self, collection: &str) -> SyncResult<StoreQuery> {
        let mut query = StoreQuery::collection(collection);
        query.order_by = self.order_by;
        if let Some(field) = self.field {
            let raw = self
                .value
                .ok_or_else(|| SyncError::invalid_input("value", "filter needs a value"))?;
            let value: Value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            query.filter = Some(match self.op.as_deref().unwrap_or("eq") {
                "eq" => FieldFilter::Equals { field, value },
                "array_contains" => FieldFilter::ArrayContains { field, value },
                other => return Err(SyncError::invalid_input("op", format!("unknown operator '{}'", other))),
            });
        }
        Ok(query)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Greater,
        (_, Some(Value::Null) | None) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Cancellation token for one subscription
///
/// Cancelling is synchronous: the feed stops at its next await point. One
/// delivery that was already in flight may still reach the sink, so consumers
/// check [`StoreEvent::subscription`] against the handle they hold. Dropping
/// the handle cancels it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub fn new(id: SubscriptionId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Remote document store contract
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> StoreKind;

    /// Insert a document and return its generated id. A null or missing
    /// `timestamp` field is stamped by the store.
    async fn write(&self, collection: &str, document: Value) -> SyncResult<String>;

    /// Merge top-level fields into an existing document
    async fn update(&self, collection: &str, id: &str, patch: Value) -> SyncResult<()>;

    /// Delete a document
    async fn delete(&self, collection: &str, id: &str) -> SyncResult<()>;

    /// One-shot query
    async fn query(&self, query: &StoreQuery) -> SyncResult<Vec<Document>>;

    /// Start a subscription feeding `sink`
    async fn subscribe(
        &self,
        query: StoreQuery,
        sink: mpsc::UnboundedSender<StoreEvent>,
    ) -> SyncResult<SubscriptionHandle>;
}

/// Result of store selection at startup
pub struct OpenedStore {
    pub store: Arc<dyn DocumentStore>,
    /// Set when the local variant was chosen and has a file to save to
    pub local: Option<Arc<LocalOnlyStore>>,
}

/// Pick the store variant for this process
///
/// The remote store is used when a server URL is configured and its health
/// check answers. Otherwise a [`LocalOnlyStore`] is loaded from the fallback
/// file, or seeded with demo conversations for `user_id` when it is empty.
pub async fn open_store(config: &AppConfig, user_id: Option<&str>) -> OpenedStore {
    if let Some(url) = &config.server_url {
        match RemoteBackedStore::new(url, config.request_timeout()) {
            Ok(remote) => match remote.health().await {
                Ok(()) => {
                    tracing::info!("[STORE] Using remote store at {}", url);
                    return OpenedStore {
                        store: Arc::new(remote),
                        local: None,
                    };
                }
                Err(e) => tracing::warn!("[STORE] Remote store unreachable, falling back to local: {}", e),
            },
            Err(e) => tracing::warn!("[STORE] Could not build remote client: {}", e),
        }
    }

    let path = config.fallback_path.clone().or_else(default_fallback_path);
    let store = match &path {
        Some(path) => match FallbackSnapshot::load(path).await {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    "[STORE] Loaded {} conversations from {}",
                    snapshot.conversations.len(),
                    path.display()
                );
                LocalOnlyStore::from_snapshot(&snapshot, Some(path.clone())).await
            }
            Ok(None) => LocalOnlyStore::with_path(Some(path.clone())),
            Err(e) => {
                tracing::warn!("[STORE] Ignoring unreadable fallback file {}: {}", path.display(), e);
                LocalOnlyStore::with_path(Some(path.clone()))
            }
        },
        None => LocalOnlyStore::with_path(None),
    };

    if let Some(user_id) = user_id.filter(|_| config.seed_demo_data) {
        if store.is_empty().await {
            demo::seed_store(&store, user_id).await;
        }
    }

    let local = Arc::new(store);
    OpenedStore {
        store: local.clone(),
        local: Some(local),
    }
}
