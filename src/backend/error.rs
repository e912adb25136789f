//! Backend error types
//!
//! Errors returned from handlers. Every variant converts to a JSON body of the
//! form:
//!
//! ```json
//! {
//!   "error": "Error message",
//!   "status": 400
//! }
//! ```

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::shared::error::SyncError;

/// Backend-specific error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request-level failure with an explicit status
    #[error("Handler error: {message}")]
    HandlerError { status: StatusCode, message: String },

    /// Failure reported by the document store
    #[error(transparent)]
    Store(#[from] SyncError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::BAD_REQUEST, message)
    }

    /// HTTP status for this error
    ///
    /// The store mapping mirrors what the HTTP client maps back: 404 for
    /// missing documents, 400 for bad input, 503 when the store is unavailable.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::Store(err) => match err {
                SyncError::NotFound { .. } => StatusCode::NOT_FOUND,
                SyncError::InvalidInput { .. } | SyncError::Serialization { .. } => StatusCode::BAD_REQUEST,
                SyncError::Unauthenticated => StatusCode::UNAUTHORIZED,
                SyncError::RemoteUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SyncError::WriteFailed { .. } | SyncError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!("[Server] {} - {}", status, message);
        } else {
            tracing::warn!("[Server] {} - {}", status, message);
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}
