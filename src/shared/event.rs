//! Store Event Types
//!
//! Documents, change deltas and the subscription payloads that carry them.
//! The same types travel over the wire between `RemoteBackedStore` and the
//! backend as newline-delimited JSON frames.
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored document: id plus JSON body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self { id: id.into(), data }
    }

    /// Read a top-level field
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.get(name)
    }
}

/// Kind of change in a delta
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One change inside a delta batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

impl DocumentChange {
    pub fn added(document: Document) -> Self {
        Self {
            kind: ChangeKind::Added,
            document,
        }
    }

    pub fn modified(document: Document) -> Self {
        Self {
            kind: ChangeKind::Modified,
            document,
        }
    }

    pub fn removed(document: Document) -> Self {
        Self {
            kind: ChangeKind::Removed,
            document,
        }
    }
}

/// One delivery from a subscription
///
/// The first delivery of every subscription is a `Snapshot` of all matching
/// documents in query order; after that only `Changes` arrive, in commit order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionPayload {
    Snapshot { documents: Vec<Document> },
    Changes { changes: Vec<DocumentChange> },
}

impl SubscriptionPayload {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, SubscriptionPayload::Snapshot { .. })
    }
}

/// Identifies one subscription for stale-delivery checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", &self.0.simple().to_string()[..8])
    }
}

/// A delivery tagged with the subscription that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub subscription: SubscriptionId,
    pub payload: SubscriptionPayload,
}
