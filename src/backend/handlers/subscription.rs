//! Subscription Handler
//!
//! `GET /collections/{collection}/subscribe` keeps the response open and
//! writes newline-delimited JSON frames:
//!
//! ```text
//! {"kind":"snapshot","documents":[...]}
//! {"kind":"changes","changes":[{"kind":"added","document":{...}}]}
//!
//! {"kind":"changes","changes":[...]}
//! ```
//!
//! Blank lines are heartbeats, sent every 30 seconds. The feed and the
//! heartbeat task stop when the client goes away: the response body owns a
//! drop guard on their cancellation token.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::error::BackendError;
use crate::backend::server::AppState;
use crate::shared::event::SubscriptionPayload;
use crate::store::memory::spawn_feed;
use crate::store::QueryParams;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

type Frame = Result<Bytes, std::io::Error>;

/// Encode one payload as a single NDJSON line
pub(crate) fn encode_frame(payload: &SubscriptionPayload) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(payload)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Open a subscription stream for a collection query
pub async fn subscribe(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Response, BackendError> {
    let query = params.into_query(&collection)?;
    tracing::info!("[Server] Subscription opened on {} ({:?})", collection, query.filter);

    let (tx, rx) = mpsc::unbounded_channel::<Frame>();
    let token = CancellationToken::new();

    let feed_tx = tx.clone();
    spawn_feed(state.documents.clone(), query, token.clone(), move |payload| {
        match encode_frame(&payload) {
            Ok(frame) => feed_tx.send(Ok(frame)).is_ok(),
            Err(e) => {
                tracing::error!("[Server] Failed to encode frame: {:?}", e);
                true
            }
        }
    });

    let heartbeat_token = token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        // first tick fires immediately
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = heartbeat_token.cancelled() => break,
                _ = interval.tick() => {
                    if tx.send(Ok(Bytes::from_static(b"\n"))).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let guard = token.drop_guard();
    let body_stream = stream::unfold((rx, guard), |(mut receiver, guard)| async move {
        receiver.recv().await.map(|frame| (frame, (receiver, guard)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache, no-transform, no-store")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(body_stream))
        .map_err(|e| BackendError::handler(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
