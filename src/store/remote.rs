//! Remote-backed store
//!
//! HTTP client for the document-store service in `backend`. Writes and queries
//! are plain JSON requests; subscriptions read a newline-delimited JSON stream
//! and reconnect with exponential backoff when the connection drops. Each
//! reconnect starts with a fresh snapshot.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{DocumentStore, QueryParams, StoreKind, StoreQuery, SubscriptionHandle};
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::{Document, StoreEvent, SubscriptionId, SubscriptionPayload};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
}

/// Document store reached over HTTP
#[derive(Debug, Clone)]
pub struct RemoteBackedStore {
    base_url: String,
    client: Client,
    stream_client: Client,
}

impl RemoteBackedStore {
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::remote_unavailable(format!("client build failed: {}", e)))?;
        // no overall timeout: subscription bodies stay open
        let stream_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SyncError::remote_unavailable(format!("client build failed: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            stream_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Probe `GET /health`
    pub async fn health(&self) -> SyncResult<()> {
        let response = self.client.get(self.url("/health")).send().await?;
        check(response).await.map(|_| ())
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_else(|_| status.to_string());
    Err(match status {
        StatusCode::NOT_FOUND => SyncError::not_found("document", body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => SyncError::invalid_input("request", body),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            SyncError::remote_unavailable(format!("{} - {}", status, body))
        }
        _ => SyncError::write_failed(format!("{} - {}", status, body)),
    })
}

#[async_trait]
impl DocumentStore for RemoteBackedStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    async fn write(&self, collection: &str, document: Value) -> SyncResult<String> {
        let url = self.url(&format!("/collections/{}/documents", collection));
        let response = self.client.post(&url).json(&document).send().await?;
        let created: WriteResponse = check(response).await?.json().await?;
        tracing::debug!("[STORE] Remote write {}/{}", collection, created.id);
        Ok(created.id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> SyncResult<()> {
        let url = self.url(&format!("/collections/{}/documents/{}", collection, id));
        let response = self.client.patch(&url).json(&patch).send().await?;
        check(response).await.map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> SyncResult<()> {
        let url = self.url(&format!("/collections/{}/documents/{}", collection, id));
        let response = self.client.delete(&url).send().await?;
        check(response).await.map(|_| ())
    }

    async fn query(&self, query: &StoreQuery) -> SyncResult<Vec<Document>> {
        let url = self.url(&format!("/collections/{}/documents", query.collection));
        let response = self
            .client
            .get(&url)
            .query(&QueryParams::from_query(query))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn subscribe(
        &self,
        query: StoreQuery,
        sink: mpsc::UnboundedSender<StoreEvent>,
    ) -> SyncResult<SubscriptionHandle> {
        let id = SubscriptionId::new();
        let token = CancellationToken::new();
        let feed = StreamFeed {
            client: self.stream_client.clone(),
            url: self.url(&format!("/collections/{}/subscribe", query.collection)),
            params: QueryParams::from_query(&query),
            id,
            sink,
        };
        tokio::spawn(feed.run(token.clone()));
        Ok(SubscriptionHandle::new(id, token))
    }
}

/// Why a single connection ended
enum StreamEnd {
    Cancelled,
    SinkClosed,
    Lost(String),
}

struct StreamFeed {
    client: Client,
    url: String,
    params: QueryParams,
    id: SubscriptionId,
    sink: mpsc::UnboundedSender<StoreEvent>,
}

/// Splits a byte stream into lines
///
/// Chunk boundaries fall anywhere, including inside a multi-byte character,
/// so bytes are only decoded once a whole line is present.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and take every line it completes
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline_pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline_pos).collect();
            line.pop();
            lines.push(line);
        }
        lines
    }
}

impl StreamFeed {
    async fn run(self, token: CancellationToken) {
        let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

        loop {
            tracing::info!("[STORE] Subscribing {} to {}", self.id, self.url);

            let end = tokio::select! {
                biased;
                _ = token.cancelled() => StreamEnd::Cancelled,
                end = self.connect_and_read(&mut reconnect_delay, &token) => end,
            };

            match end {
                StreamEnd::Cancelled => {
                    tracing::debug!("[STORE] Subscription {} cancelled", self.id);
                    return;
                }
                StreamEnd::SinkClosed => {
                    tracing::debug!("[STORE] Subscription {} consumer gone", self.id);
                    return;
                }
                StreamEnd::Lost(reason) => {
                    tracing::warn!(
                        "[STORE] Subscription {} lost ({}), retrying in {:?}",
                        self.id,
                        reason,
                        reconnect_delay
                    );
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
            reconnect_delay = std::cmp::min(reconnect_delay * 2, MAX_RECONNECT_DELAY);
        }
    }

    async fn connect_and_read(&self, reconnect_delay: &mut Duration, token: &CancellationToken) -> StreamEnd {
        let response = match self.client.get(&self.url).query(&self.params).send().await {
            Ok(response) => response,
            Err(e) => return StreamEnd::Lost(format!("network: {}", e)),
        };
        if !response.status().is_success() {
            return StreamEnd::Lost(format!("http: {}", response.status()));
        }

        tracing::info!("[STORE] Subscription {} established", self.id);
        *reconnect_delay = INITIAL_RECONNECT_DELAY;

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::default();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return StreamEnd::Lost(format!("stream: {}", e)),
            };

            for line in buffer.push(&chunk) {
                let line = line.trim_ascii();
                // blank lines are heartbeats
                if line.is_empty() {
                    continue;
                }
                let payload = match serde_json::from_slice::<SubscriptionPayload>(line) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(
                            "[STORE] Skipping unparseable frame: {} | {}",
                            e,
                            String::from_utf8_lossy(line)
                        );
                        continue;
                    }
                };
                if token.is_cancelled() {
                    return StreamEnd::Cancelled;
                }
                let event = StoreEvent {
                    subscription: self.id,
                    payload,
                };
                if self.sink.send(event).is_err() {
                    return StreamEnd::SinkClosed;
                }
            }
        }

        StreamEnd::Lost("stream closed by server".to_string())
    }
}
