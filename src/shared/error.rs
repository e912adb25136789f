//! Shared Error Types
//!
//! Errors raised by the synchronization layer, the store implementations and
//! the fallback persistence. The backend has its own HTTP-facing error in
//! `backend::error` which wraps this one.
//!
//! # Error Categories
//!
//! - `RemoteUnavailable` - the document store could not be reached
//! - `InvalidInput` - a user action was rejected before touching any state
//! - `WriteFailed` - the store answered but refused the write
//! - `Unauthenticated` - no signed-in user for an operation that needs one
//! - `Serialization` - JSON encode/decode failures
//! - `Storage` - fallback file I/O
//! - `NotFound` - unknown conversation or message
//!
//! # Usage
//!
//! ```rust
//! use schoolchat::shared::error::SyncError;
//!
//! let error = SyncError::invalid_input("body", "Message text cannot be empty");
//! assert!(!error.is_recoverable());
//! ```
use thiserror::Error;

/// Errors produced by the messaging synchronization layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network loss or the store refusing connections
    #[error("Remote store unavailable: {message}")]
    RemoteUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// Rejected user input
    #[error("Invalid input in field '{field}': {message}")]
    InvalidInput {
        /// The offending field
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// The store rejected a write
    #[error("Write failed: {message}")]
    WriteFailed {
        /// Human-readable error message
        message: String,
    },

    /// No user is signed in
    #[error("No signed-in user")]
    Unauthenticated,

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Local persistence error
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// Unknown conversation or message
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up
        kind: &'static str,
        /// The id that did not resolve
        id: String,
    },
}

impl SyncError {
    /// Create a new remote-unavailable error
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Create a new invalid-input error
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new write-failed error
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether retrying the same operation later could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. } | Self::WriteFailed { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::remote_unavailable(err.to_string())
        } else if err.is_decode() {
            Self::serialization(err.to_string())
        } else {
            Self::write_failed(err.to_string())
        }
    }
}

/// Result alias used across the crate
pub type SyncResult<T> = Result<T, SyncError>;
