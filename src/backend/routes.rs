//! Route configuration
//!
//! | Method | Path                                   | Handler            |
//! |--------|----------------------------------------|--------------------|
//! | GET    | `/health`                              | `health`           |
//! | POST   | `/collections/{collection}/documents`  | `create_document`  |
//! | GET    | `/collections/{collection}/documents`  | `list_documents`   |
//! | PATCH  | `/collections/{collection}/documents/{id}` | `update_document` |
//! | DELETE | `/collections/{collection}/documents/{id}` | `delete_document` |
//! | GET    | `/collections/{collection}/subscribe`  | `subscribe`        |

use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::handlers::{documents, subscription};
use crate::backend::server::AppState;

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(documents::health))
        .route(
            "/collections/{collection}/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/collections/{collection}/documents/{id}",
            patch(documents::update_document).delete(documents::delete_document),
        )
        .route("/collections/{collection}/subscribe", get(subscription::subscribe))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
