//! End-to-end tests against the document-store server
//!
//! Each test binds the axum app to an ephemeral port and talks to it through
//! `RemoteBackedStore`.

pub mod remote_test;

use std::sync::Arc;
use std::time::Duration;

use schoolchat::backend::create_app_with;
use schoolchat::store::{MemoryCollections, RemoteBackedStore};

pub struct TestServer {
    pub url: String,
    pub documents: Arc<MemoryCollections>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let documents = Arc::new(MemoryCollections::new());
        let app = create_app_with(documents.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{}", addr),
            documents,
            task,
        }
    }

    pub fn store(&self) -> RemoteBackedStore {
        RemoteBackedStore::new(&self.url, Duration::from_secs(5)).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
