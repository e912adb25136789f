//! Client Module
//!
//! Client-side synchronization for the messaging screen: the local cache, the
//! controller that keeps it in step with the store, and the supporting pieces
//! (session, configuration, offline fallback, demo data).
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use schoolchat::client::{NoopRenderer, SessionContext, SyncController, UserIdentity};
//! use schoolchat::shared::AppConfig;
//! use schoolchat::store::LocalOnlyStore;
//!
//! # async fn run() -> Result<(), schoolchat::shared::SyncError> {
//! let user = UserIdentity::new("student1", "Sara");
//! let session = SessionContext::new(Some(user), AppConfig::default());
//! let mut controller = SyncController::new(Arc::new(LocalOnlyStore::new()), session, Box::new(NoopRenderer));
//! controller.load_conversations().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod demo;
pub mod offline;
pub mod session;
pub mod sync;

pub use cache::LocalCache;
pub use config::Config;
pub use session::{IdentityProvider, LocalIdentity, SessionContext, UserIdentity};
pub use sync::{ChannelRenderer, NoopRenderer, RenderSink, RenderUpdate, SyncController, SyncPhase};
