//! Object storage for message attachments
//!
//! Files attached to messages are uploaded under
//! `message-files/{conversation}/{millis}_{name}` and the message carries the
//! returned URL. Only the upload/delete contract lives here; object lifecycle
//! is the storage provider's business.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::shared::error::{SyncError, SyncResult};

/// Largest attachment accepted, in bytes
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Accepted attachment extensions
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "jpg", "jpeg", "png"];

/// Check an attachment's name and size before upload
pub fn validate_attachment(file_name: &str, size: usize) -> SyncResult<()> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(SyncError::invalid_input(
            "file_name",
            format!("unsupported file type '{}'; allowed: {}", file_name, ALLOWED_EXTENSIONS.join(", ")),
        ));
    }
    if size == 0 {
        return Err(SyncError::invalid_input("file", "file is empty"));
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(SyncError::invalid_input(
            "file",
            format!("file is {} bytes; limit is {}", size, MAX_ATTACHMENT_BYTES),
        ));
    }
    Ok(())
}

/// Object path for an attachment
pub fn attachment_path(conversation_id: &str, file_name: &str) -> String {
    format!(
        "message-files/{}/{}_{}",
        conversation_id,
        chrono::Utc::now().timestamp_millis(),
        file_name
    )
}

/// Blob storage contract
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `path` and return a download URL
    async fn upload(&self, path: &str, bytes: Vec<u8>, mime_type: &str) -> SyncResult<String>;

    /// Remove the object at `path`
    async fn delete(&self, path: &str) -> SyncResult<()>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    mime_type: String,
}

/// In-process object storage serving `mem://` URLs
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStorage {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes and MIME type stored at `path`
    pub async fn get(&self, path: &str) -> Option<(Vec<u8>, String)> {
        let objects = self.objects.read().await;
        objects.get(path).map(|o| (o.bytes.clone(), o.mime_type.clone()))
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, mime_type: &str) -> SyncResult<String> {
        let mut objects = self.objects.write().await;
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(format!("mem://{}", path))
    }

    async fn delete(&self, path: &str) -> SyncResult<()> {
        let mut objects = self.objects.write().await;
        objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| SyncError::not_found("object", path))
    }
}
