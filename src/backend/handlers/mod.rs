//! Request handlers
//!
//! - **`documents`** - health, write, patch, delete and query
//! - **`subscription`** - streaming snapshot-then-changes feed

pub mod documents;
pub mod subscription;
