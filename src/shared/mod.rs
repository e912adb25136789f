//! Shared Module
//!
//! Types used by both the client-side synchronization layer and the
//! document-store backend: the message and conversation records, the store
//! event payloads, the error type and configuration.
//!
//! # Overview
//!
//! Everything here is plain data with serde support so it can cross the HTTP
//! boundary between `store::RemoteBackedStore` and the backend unchanged.

/// Store event system
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Messaging records
pub mod messaging;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError, EchoPolicy, WriteFailurePolicy};
pub use error::{SyncError, SyncResult};
pub use event::{ChangeKind, Document, DocumentChange, StoreEvent, SubscriptionId, SubscriptionPayload};
