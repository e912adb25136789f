//! schoolchat - Main Library
//!
//! Conversation and message synchronization for the school portal's chat. A
//! client keeps a local cache of conversations and messages in step with a
//! document store, sends messages optimistically, and falls back to a local
//! store when the remote one cannot be reached.
//!
//! # Overview
//!
//! This library provides:
//! - A local cache with per-conversation ordering and duplicate suppression
//! - A synchronization controller owning one live subscription at a time
//! - Optimistic sends reconciled with the store's echo by correlation token
//! - A remote HTTP store client and an in-process local store behind one trait
//! - A JSON fallback file for offline use
//! - An axum document-store server (with the `ssr` feature)
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between client and backend
//!   - Messages, conversations, store events
//!   - Configuration and error types
//!
//! - **`store`** - Document store contract and its variants
//!   - `RemoteBackedStore` over HTTP, `LocalOnlyStore` in process
//!   - Store selection at startup, object storage for attachments
//!
//! - **`client`** - Everything that runs next to the UI
//!   - `LocalCache`, `SyncController`, rendering adapter
//!   - Session context, optimistic ledger, fallback file, demo data
//!
//! - **`backend`** - Document-store server (only compiled with `ssr` feature)
//!
//! # Feature Flags
//!
//! - **`ssr`** - Builds the backend module and the `schoolchat-server` binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use schoolchat::client::{Config, NoopRenderer, SessionContext, SyncController, UserIdentity};
//! use schoolchat::store::open_store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?.into_app();
//! let opened = open_store(&config, Some("student1")).await;
//! let session = SessionContext::new(Some(UserIdentity::new("student1", "Sara")), config);
//! let mut controller = SyncController::new(opened.store, session, Box::new(NoopRenderer));
//!
//! controller.load_conversations().await?;
//! if let Some(active) = controller.active_conversation().map(str::to_string) {
//!     controller.send_message(&active, "Good morning")?;
//! }
//! while controller.process_next().await {}
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - **Controller**: driven through `&mut self` from one task; background
//!   writes and subscription feeds talk to it over channels
//! - **Stores**: `Send + Sync`, shared as `Arc<dyn DocumentStore>`
//! - **Server**: collections behind `RwLock`, commits fanned out over
//!   `broadcast::Sender`
//!
//! # Error Handling
//!
//! - `shared::error::SyncError` for store and controller failures
//! - `shared::config::ConfigError` for configuration
//! - `backend::BackendError` for HTTP handlers
//!
//! Store failures never interrupt the user: the controller records them and
//! keeps going.

/// Shared types and data structures
pub mod shared;

/// Document store contract and variants
pub mod store;

/// Client-side cache, controller and session
pub mod client;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
