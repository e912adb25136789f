//! Document handlers
//!
//! Plain JSON request/response handlers over the shared collections. A write
//! whose `timestamp` is null or missing gets the store's clock.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::backend::error::BackendError;
use crate::backend::server::AppState;
use crate::shared::event::Document;
use crate::store::QueryParams;

/// Health check (GET /health)
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn require_object(document: &Value) -> Result<(), BackendError> {
    if document.is_object() {
        Ok(())
    } else {
        Err(BackendError::bad_request("document must be a JSON object"))
    }
}

/// Insert a document (POST /collections/{collection}/documents)
///
/// Answers `201 {"id": "<generated>"}`.
pub async fn create_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(document): Json<Value>,
) -> Result<(StatusCode, Json<Value>), BackendError> {
    require_object(&document)?;
    let stored = state.documents.insert(&collection, document).await?;
    tracing::info!("[Server] Created {}/{}", collection, stored.id);
    Ok((StatusCode::CREATED, Json(json!({ "id": stored.id }))))
}

/// Merge fields into a document (PATCH /collections/{collection}/documents/{id})
pub async fn update_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<Document>, BackendError> {
    require_object(&patch)?;
    let updated = state.documents.update(&collection, &id, patch).await?;
    tracing::debug!("[Server] Updated {}/{}", collection, id);
    Ok(Json(updated))
}

/// Remove a document (DELETE /collections/{collection}/documents/{id})
pub async fn delete_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, BackendError> {
    state.documents.delete(&collection, &id).await?;
    tracing::info!("[Server] Deleted {}/{}", collection, id);
    Ok(StatusCode::NO_CONTENT)
}

/// One-shot query (GET /collections/{collection}/documents)
pub async fn list_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<Document>>, BackendError> {
    let query = params.into_query(&collection)?;
    let documents = state.documents.query(&query).await;
    tracing::debug!("[Server] Query on {} matched {} documents", collection, documents.len());
    Ok(Json(documents))
}
