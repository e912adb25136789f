//! Backend Module
//!
//! Document-store service for the school portal. It serves the same contract
//! [`crate::store::RemoteBackedStore`] speaks: collection writes, patches,
//! deletes, filtered queries and streaming subscriptions.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs       - Module exports and documentation
//! ├── server.rs    - Application state and app assembly
//! ├── routes.rs    - Route table and middleware
//! ├── handlers/    - Document and subscription handlers
//! └── error.rs     - BackendError and its HTTP conversion
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`
//! - `POST /collections/{collection}/documents`
//! - `GET /collections/{collection}/documents?field&op&value&orderBy`
//! - `PATCH /collections/{collection}/documents/{id}`
//! - `DELETE /collections/{collection}/documents/{id}`
//! - `GET /collections/{collection}/subscribe?field&op&value&orderBy`
//!
//! The subscription endpoint answers with newline-delimited JSON: one snapshot
//! frame, then one `changes` frame per matching commit, with blank heartbeat
//! lines every 30 seconds.
//!
//! # State Management
//!
//! All collections live in one [`MemoryCollections`](crate::store::MemoryCollections)
//! behind an `Arc`. Commits fan out over its broadcast channel, so every open
//! subscription sees changes in commit order.
//!
//! # Example
//!
//! ```rust,no_run
//! use schoolchat::backend::create_app;
//!
//! # async fn example() -> std::io::Result<()> {
//! let app = create_app();
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Backend error types
pub mod error;

/// Request handlers
pub mod handlers;

/// Route configuration
pub mod routes;

/// Application state and assembly
pub mod server;

pub use error::BackendError;
pub use server::{create_app, create_app_with, AppState};
