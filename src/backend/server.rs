//! Server Initialization
//!
//! Application state and app assembly. State is an `Arc` over one
//! [`MemoryCollections`] shared by every handler.

use std::sync::Arc;

use axum::Router;

use crate::backend::routes::create_router;
use crate::store::MemoryCollections;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<MemoryCollections>,
}

impl AppState {
    pub fn new(documents: Arc<MemoryCollections>) -> Self {
        Self { documents }
    }
}

/// Create the app over an empty document store
pub fn create_app() -> Router {
    create_app_with(Arc::new(MemoryCollections::new()))
}

/// Create the app over an existing document store
pub fn create_app_with(documents: Arc<MemoryCollections>) -> Router {
    tracing::info!("[Server] Initializing document store service");
    let app = create_router(AppState::new(documents));
    tracing::info!("[Server] Router configured");
    app
}
