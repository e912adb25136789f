//! Synchronization Controller
//!
//! Keeps the [`LocalCache`] in step with the document store for the one
//! conversation the user has open, and owns the optimistic send path.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --select_conversation--> Attaching --first snapshot--> Synced
//!   ^                               |                            |
//!   +------- sign-out --------------+----------------------------+
//! ```
//!
//! Selecting a conversation cancels the previous subscription, resets the
//! "initial snapshot consumed" latch, clears that conversation's cache entries
//! and subscribes again. The first delivery is a full snapshot; after the
//! latch is set only `added` deltas are merged.
//!
//! `load_conversations` also keeps a second subscription open on the user's
//! conversation list, so summaries of conversations that are not open stay
//! current and count unread messages.
//!
//! ## Threading
//!
//! The controller is driven through `&mut self` from a single task. Store
//! deliveries and write completions arrive on its inbox channels and are
//! applied by [`SyncController::poll`] or [`SyncController::process_next`].
//! Every delivery carries its subscription id; anything not from the active
//! handle or the conversation list feed is dropped.
//!
//! `send_message` spawns the write on the ambient tokio runtime, so it must be
//! called from within one.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, watch};

use super::render::RenderSink;
use crate::client::cache::LocalCache;
use crate::client::offline::optimistic::{OptimisticLedger, PendingState};
use crate::client::session::{SessionContext, UserIdentity};
use crate::shared::config::{EchoPolicy, WriteFailurePolicy};
use crate::shared::error::{SyncError, SyncResult};
use crate::shared::event::{ChangeKind, Document, DocumentChange, StoreEvent, SubscriptionPayload};
use crate::shared::messaging::{
    ChatMessage, Conversation, DeliveryStatus, MessageBody, CONVERSATIONS_COLLECTION, MESSAGES_COLLECTION,
};
use crate::store::objects::{attachment_path, validate_attachment, ObjectStorage};
use crate::store::{DocumentStore, StoreQuery, SubscriptionHandle};

/// Where the controller is in the subscription lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No active conversation
    Idle,
    /// Subscribed, waiting for the first snapshot
    Attaching,
    /// First snapshot consumed; applying deltas
    Synced,
}

/// Result of a background write, posted back to the controller
#[derive(Debug)]
struct WriteOutcome {
    token: String,
    conversation_id: String,
    result: SyncResult<String>,
}

enum Inbound {
    Store(StoreEvent),
    Write(WriteOutcome),
}

struct ActiveSubscription {
    conversation_id: String,
    handle: SubscriptionHandle,
    snapshot_consumed: bool,
}

/// Conversation/message synchronization controller
pub struct SyncController {
    store: Arc<dyn DocumentStore>,
    objects: Option<Arc<dyn ObjectStorage>>,
    session: SessionContext,
    cache: LocalCache,
    renderer: Box<dyn RenderSink>,
    active: Option<ActiveSubscription>,
    conversation_feed: Option<SubscriptionHandle>,
    ledger: OptimisticLedger,
    store_tx: mpsc::UnboundedSender<StoreEvent>,
    store_rx: mpsc::UnboundedReceiver<StoreEvent>,
    write_tx: mpsc::UnboundedSender<WriteOutcome>,
    write_rx: mpsc::UnboundedReceiver<WriteOutcome>,
    errors: Vec<SyncError>,
}

impl SyncController {
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionContext, renderer: Box<dyn RenderSink>) -> Self {
        let (store_tx, store_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        tracing::info!("[SYNC] Controller created over {:?} store", store.kind());
        Self {
            store,
            objects: None,
            session,
            cache: LocalCache::new(),
            renderer,
            active: None,
            conversation_feed: None,
            ledger: OptimisticLedger::new(),
            store_tx,
            store_rx,
            write_tx,
            write_rx,
            errors: Vec::new(),
        }
    }

    /// Attach object storage for file messages
    pub fn with_object_storage(mut self, objects: Arc<dyn ObjectStorage>) -> Self {
        self.objects = Some(objects);
        self
    }

    // ===== Accessors =====

    pub fn phase(&self) -> SyncPhase {
        match &self.active {
            None => SyncPhase::Idle,
            Some(active) if active.snapshot_consumed => SyncPhase::Synced,
            Some(_) => SyncPhase::Attaching,
        }
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.conversation_id.as_str())
    }

    /// Ordered copy of a conversation's messages
    pub fn messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.cache.list_messages(conversation_id)
    }

    /// Conversation summaries, most recent first
    pub fn conversations(&self) -> Vec<Conversation> {
        self.cache.conversations()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Number of sends not yet confirmed by the store
    pub fn pending_sends(&self) -> usize {
        self.ledger.len()
    }

    /// Non-fatal errors recorded since the last call
    pub fn take_errors(&mut self) -> Vec<SyncError> {
        std::mem::take(&mut self.errors)
    }

    pub fn errors(&self) -> &[SyncError] {
        &self.errors
    }

    fn record(&mut self, error: SyncError) {
        tracing::warn!("[SYNC] {}", error);
        self.errors.push(error);
    }

    fn preview_length(&self) -> usize {
        self.session.config().preview_length
    }

    fn echo_policy(&self) -> EchoPolicy {
        self.session.config().echo_policy
    }

    // ===== Rendering =====

    fn render_active(&mut self) {
        if let Some(active) = &self.active {
            let messages = self.cache.list_messages(&active.conversation_id);
            self.renderer.render_messages(&active.conversation_id, messages);
        }
    }

    fn render_conversations(&mut self) {
        let conversations = self.cache.conversations();
        self.renderer.render_conversations(conversations);
    }

    // ===== Subscription lifecycle =====

    fn detach(&mut self) {
        if let Some(previous) = self.active.take() {
            previous.handle.cancel();
            tracing::debug!(
                "[SYNC] Cancelled {} for conversation {}",
                previous.handle.id(),
                previous.conversation_id
            );
        }
    }

    /// Make `conversation_id` the active conversation and subscribe to its
    /// messages
    pub async fn select_conversation(&mut self, conversation_id: &str) -> SyncResult<()> {
        self.session.require_user()?;
        if conversation_id.trim().is_empty() {
            return Err(SyncError::invalid_input("conversation_id", "conversation id cannot be empty"));
        }

        self.detach();
        self.cache.clear_conversation(conversation_id);
        self.restore_pending(conversation_id);
        self.mark_read(conversation_id);

        let query = StoreQuery::messages_of(conversation_id);
        match self.store.subscribe(query, self.store_tx.clone()).await {
            Ok(handle) => {
                tracing::info!("[SYNC] Attaching {} to conversation {}", handle.id(), conversation_id);
                self.active = Some(ActiveSubscription {
                    conversation_id: conversation_id.to_string(),
                    handle,
                    snapshot_consumed: false,
                });
                self.render_active();
            }
            Err(e) => self.record(e),
        }
        Ok(())
    }

    fn detach_conversation_feed(&mut self) {
        if let Some(feed) = self.conversation_feed.take() {
            feed.cancel();
            tracing::debug!("[SYNC] Cancelled conversation list feed {}", feed.id());
        }
    }

    /// Subscribe to the signed-in user's conversation list unless already
    /// subscribed
    async fn attach_conversation_feed(&mut self, user_id: &str) {
        if self.conversation_feed.is_some() {
            return;
        }
        let query = StoreQuery::conversations_of(user_id);
        match self.store.subscribe(query, self.store_tx.clone()).await {
            Ok(handle) => {
                tracing::info!("[SYNC] Following conversation list of {} via {}", user_id, handle.id());
                self.conversation_feed = Some(handle);
            }
            Err(e) => self.record(e),
        }
    }

    /// Put unconfirmed sends back after the conversation was cleared
    fn restore_pending(&mut self, conversation_id: &str) {
        let policy = self.session.config().write_failure_policy;
        let pending: Vec<ChatMessage> = self
            .ledger
            .pending_for(conversation_id)
            .into_iter()
            .map(|p| {
                let mut message = p.message.clone();
                if p.state == PendingState::Failed && policy == WriteFailurePolicy::MarkFailed {
                    message.status = DeliveryStatus::Failed;
                }
                message
            })
            .collect();
        for message in pending {
            self.cache.append_message(conversation_id, message);
        }
    }

    /// React to an identity change. `None` tears everything down.
    pub fn handle_auth_change(&mut self, user: Option<UserIdentity>) {
        let same_user = match (self.session.user(), &user) {
            (Some(current), Some(next)) => current.uid == next.uid,
            _ => false,
        };
        if same_user {
            self.session.set_user(user);
            return;
        }

        self.detach();
        self.detach_conversation_feed();
        self.ledger.clear();
        self.cache = LocalCache::new();
        // anything already queued belongs to the previous session
        while self.store_rx.try_recv().is_ok() {}
        while self.write_rx.try_recv().is_ok() {}

        match &user {
            Some(u) => tracing::info!("[SYNC] Session switched to {}", u.uid),
            None => tracing::info!("[SYNC] Signed out, controller idle"),
        }
        self.session.set_user(user);
        self.render_conversations();
    }

    /// Wait for the next identity change and apply it. Returns `false` once
    /// the provider is gone.
    pub async fn follow_identity(&mut self, identity: &mut watch::Receiver<Option<UserIdentity>>) -> bool {
        if identity.changed().await.is_err() {
            return false;
        }
        let user = identity.borrow_and_update().clone();
        self.handle_auth_change(user);
        true
    }

    // ===== Inbox =====

    /// Apply every queued delivery without waiting. Returns how many were
    /// applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.store_rx.try_recv() {
            self.apply(Inbound::Store(event));
            applied += 1;
        }
        while let Ok(outcome) = self.write_rx.try_recv() {
            self.apply(Inbound::Write(outcome));
            applied += 1;
        }
        applied
    }

    /// Wait for one delivery and apply it
    pub async fn process_next(&mut self) -> bool {
        let next = tokio::select! {
            Some(event) = self.store_rx.recv() => Inbound::Store(event),
            Some(outcome) = self.write_rx.recv() => Inbound::Write(outcome),
            else => return false,
        };
        self.apply(next);
        true
    }

    fn apply(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Store(event) => self.apply_store_event(event),
            Inbound::Write(outcome) => self.apply_write_outcome(outcome),
        }
    }

    fn apply_store_event(&mut self, event: StoreEvent) {
        if self
            .conversation_feed
            .as_ref()
            .is_some_and(|feed| feed.id() == event.subscription && !feed.is_cancelled())
        {
            self.apply_conversation_event(event.payload);
            return;
        }
        let Some(active) = self.active.as_ref() else {
            tracing::debug!("[SYNC] Dropping delivery from {}: no active conversation", event.subscription);
            return;
        };
        if event.subscription != active.handle.id() || active.handle.is_cancelled() {
            tracing::debug!(
                "[SYNC] Dropping stale delivery from {} (active {})",
                event.subscription,
                active.handle.id()
            );
            return;
        }
        let conversation_id = active.conversation_id.clone();
        let latch_set = active.snapshot_consumed;

        match event.payload {
            SubscriptionPayload::Snapshot { documents } => {
                let count = documents.len();
                for doc in documents {
                    self.merge_document(&conversation_id, &doc, true);
                }
                if let Some(active) = self.active.as_mut() {
                    active.snapshot_consumed = true;
                }
                if latch_set {
                    tracing::info!("[SYNC] Resync snapshot of {} merged into {}", count, conversation_id);
                } else {
                    tracing::info!("[SYNC] Initial snapshot of {} consumed for {}", count, conversation_id);
                }
                self.render_conversations();
            }
            SubscriptionPayload::Changes { changes } => {
                if !latch_set {
                    tracing::warn!("[SYNC] Delta before snapshot on {}, merging anyway", conversation_id);
                }
                for change in changes {
                    match change.kind {
                        ChangeKind::Added => self.merge_document(&conversation_id, &change.document, false),
                        ChangeKind::Modified | ChangeKind::Removed => {
                            tracing::debug!(
                                "[SYNC] Ignoring {:?} of {} in {}",
                                change.kind,
                                change.document.id,
                                conversation_id
                            );
                        }
                    }
                }
            }
        }
        self.render_active();
    }

    fn apply_conversation_event(&mut self, payload: SubscriptionPayload) {
        let Some(viewer_id) = self.session.user().map(|u| u.uid.clone()) else {
            return;
        };
        let changes = match payload {
            SubscriptionPayload::Snapshot { documents } => {
                documents.into_iter().map(DocumentChange::added).collect()
            }
            SubscriptionPayload::Changes { changes } => changes,
        };
        for change in changes {
            if change.kind == ChangeKind::Removed {
                if self.cache.remove_conversation(&change.document.id) {
                    tracing::info!("[SYNC] Conversation {} removed", change.document.id);
                }
                continue;
            }
            match Conversation::from_document(&change.document) {
                Ok(summary) => {
                    let is_open = self.active_conversation() == Some(summary.id.as_str());
                    self.cache.merge_conversation(summary, &viewer_id, is_open);
                }
                Err(e) => tracing::warn!("[SYNC] Skipping malformed conversation {}: {}", change.document.id, e),
            }
        }
        self.render_conversations();
    }

    fn merge_document(&mut self, conversation_id: &str, doc: &Document, from_snapshot: bool) {
        let message = match ChatMessage::from_document(doc) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("[SYNC] Skipping malformed message {}: {}", doc.id, e);
                return;
            }
        };
        if message.conversation_id != conversation_id {
            tracing::debug!("[SYNC] Skipping message {} from conversation {}", message.id, message.conversation_id);
            return;
        }

        if self.echo_policy() == EchoPolicy::Reconcile {
            if let Some(token) = message.client_token.clone() {
                let optimistic_id = self
                    .cache
                    .find_by_token(conversation_id, &token)
                    .map(|m| m.id.clone());
                if let Some(optimistic_id) = optimistic_id {
                    tracing::debug!("[SYNC] Echo {} reconciles {}", message.id, optimistic_id);
                    self.ledger.confirm(&token, &message.id);
                    self.cache.replace_message(conversation_id, &optimistic_id, message);
                    return;
                }
            }
        }

        if self.cache.append_message(conversation_id, message.clone()) && !from_snapshot {
            let preview_len = self.preview_length();
            self.cache.record_activity(conversation_id, &message, preview_len, false);
        }
    }

    fn apply_write_outcome(&mut self, outcome: WriteOutcome) {
        let WriteOutcome {
            token,
            conversation_id,
            result,
        } = outcome;

        match result {
            Ok(store_id) => {
                let Some(pending) = self.ledger.confirm(&token, &store_id) else {
                    tracing::debug!("[SYNC] Write {} already reconciled", store_id);
                    return;
                };
                if self.echo_policy() == EchoPolicy::Reconcile {
                    self.cache.rekey_message(&conversation_id, &pending.message.id, &store_id);
                }
                tracing::debug!("[SYNC] Write confirmed: {} -> {}", pending.message.id, store_id);
            }
            Err(error) => {
                let local_id = match self.ledger.fail(&token, error.to_string()) {
                    Some(pending) => pending.message.id.clone(),
                    None => {
                        tracing::debug!("[SYNC] Failure for forgotten send {}: {}", token, error);
                        return;
                    }
                };
                if self.session.config().write_failure_policy == WriteFailurePolicy::MarkFailed {
                    self.cache.set_status(&conversation_id, &local_id, DeliveryStatus::Failed);
                }
                self.record(error);
            }
        }

        if self.active_conversation() == Some(conversation_id.as_str()) {
            self.render_active();
        }
    }

    // ===== Sending =====

    fn require_active(&self, conversation_id: &str) -> SyncResult<()> {
        if self.active_conversation() != Some(conversation_id) {
            return Err(SyncError::invalid_input(
                "conversation_id",
                format!("conversation '{}' is not the active conversation", conversation_id),
            ));
        }
        Ok(())
    }

    /// Send a text message to the active conversation
    ///
    /// The message is appended and rendered before this returns; the store
    /// write runs in the background. Write failures are recorded, never
    /// returned.
    pub fn send_message(&mut self, conversation_id: &str, body: &str) -> SyncResult<ChatMessage> {
        let user = self.session.require_user()?.clone();
        let text = body.trim();
        if text.is_empty() {
            return Err(SyncError::invalid_input("body", "message text cannot be empty"));
        }
        self.require_active(conversation_id)?;
        Ok(self.send_body(conversation_id, &user, MessageBody::text(text)))
    }

    /// Upload a file and send it as a file message
    pub async fn send_file(
        &mut self,
        conversation_id: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> SyncResult<ChatMessage> {
        let user = self.session.require_user()?.clone();
        self.require_active(conversation_id)?;
        validate_attachment(file_name, bytes.len())?;
        let objects = self
            .objects
            .clone()
            .ok_or_else(|| SyncError::invalid_input("file", "file sharing is not available"))?;

        let path = attachment_path(conversation_id, file_name);
        let url = objects.upload(&path, bytes, mime_type).await?;
        tracing::info!("[SYNC] Uploaded {} to {}", file_name, url);

        // the user may have switched conversations during the upload
        self.require_active(conversation_id)?;
        let body = MessageBody::File {
            content: url,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        };
        Ok(self.send_body(conversation_id, &user, body))
    }

    fn send_body(&mut self, conversation_id: &str, user: &UserIdentity, body: MessageBody) -> ChatMessage {
        let message =
            ChatMessage::new_local(conversation_id, user.uid.clone(), body).with_sender_name(user.display_name.clone());
        tracing::info!(
            "[SYNC] Sending {} to {}: '{}'",
            message.id,
            conversation_id,
            message.preview(50)
        );

        self.cache.append_message(conversation_id, message.clone());
        let preview_len = self.preview_length();
        self.cache.record_activity(conversation_id, &message, preview_len, false);
        if let Some(token) = self.ledger.track(&message) {
            self.spawn_write(token, &message);
        }
        self.render_active();
        self.render_conversations();
        message
    }

    fn spawn_write(&self, token: String, message: &ChatMessage) {
        let conversation_id = message.conversation_id.clone();
        let document = match message.to_write_document() {
            Ok(document) => document,
            Err(e) => {
                let _ = self.write_tx.send(WriteOutcome {
                    token,
                    conversation_id,
                    result: Err(e),
                });
                return;
            }
        };
        let preview = message.preview(self.preview_length());
        let sender_id = message.sender_id.clone();
        let store = self.store.clone();
        let tx = self.write_tx.clone();

        tokio::spawn(async move {
            let result = store.write(MESSAGES_COLLECTION, document).await;
            if result.is_ok() {
                let patch = json!({
                    "lastMessage": preview,
                    "lastMessageSender": sender_id,
                    "timestamp": null,
                });
                if let Err(e) = store.update(CONVERSATIONS_COLLECTION, &conversation_id, patch).await {
                    tracing::debug!("[SYNC] Conversation summary update skipped for {}: {}", conversation_id, e);
                }
            }
            let outcome = WriteOutcome {
                token,
                conversation_id,
                result,
            };
            if tx.send(outcome).is_err() {
                tracing::debug!("[SYNC] Controller gone before write completed");
            }
        });
    }

    /// Re-issue the write for a failed send
    pub fn retry_message(&mut self, conversation_id: &str, message_id: &str) -> SyncResult<()> {
        self.session.require_user()?;
        let token = self
            .ledger
            .token_for(conversation_id, message_id)
            .ok_or_else(|| SyncError::not_found("pending message", message_id))?;
        let message = self
            .ledger
            .begin_retry(&token)
            .map(|p| p.message.clone())
            .ok_or_else(|| SyncError::invalid_input("message_id", "message is still being sent"))?;

        tracing::info!("[SYNC] Retrying {} in {}", message_id, conversation_id);
        self.cache.set_status(conversation_id, message_id, DeliveryStatus::Sent);
        self.spawn_write(token, &message);
        if self.active_conversation() == Some(conversation_id) {
            self.render_active();
        }
        Ok(())
    }

    // ===== Conversations =====

    /// Load the user's conversations, keep following the list, and open the
    /// first one if nothing is open yet
    pub async fn load_conversations(&mut self) -> SyncResult<Vec<Conversation>> {
        let user_id = self.session.require_user()?.uid.clone();
        match self.store.query(&StoreQuery::conversations_of(&user_id)).await {
            Ok(documents) => {
                let mut loaded = 0;
                for doc in &documents {
                    match Conversation::from_document(doc) {
                        Ok(summary) => {
                            self.cache.upsert_conversation(summary);
                            loaded += 1;
                        }
                        Err(e) => tracing::warn!("[SYNC] Skipping malformed conversation {}: {}", doc.id, e),
                    }
                }
                tracing::info!("[SYNC] Loaded {} conversations for {}", loaded, user_id);
            }
            Err(e) => self.record(e),
        }
        self.render_conversations();
        self.attach_conversation_feed(&user_id).await;

        if self.active.is_none() {
            let first = self.cache.conversations().into_iter().next();
            if let Some(first) = first {
                self.select_conversation(&first.id).await?;
            }
        }
        Ok(self.cache.conversations())
    }

    /// Start a direct conversation with `participant_id` and open it
    ///
    /// When the store refuses the write the conversation still exists locally
    /// under a `conv_<millis>` id.
    pub async fn create_conversation(
        &mut self,
        participant_id: &str,
        display_name: Option<&str>,
    ) -> SyncResult<Conversation> {
        let user_id = self.session.require_user()?.uid.clone();
        let participant_id = participant_id.trim();
        if participant_id.is_empty() || participant_id == user_id {
            return Err(SyncError::invalid_input("participant_id", "pick someone else to talk to"));
        }

        let mut conversation = Conversation::new_direct(String::new(), user_id, participant_id)
            .with_name(display_name.unwrap_or(participant_id));
        conversation.validate()?;

        let now = chrono::Utc::now().timestamp_millis();
        let document = conversation.to_write_document()?;
        conversation.id = match self.store.write(CONVERSATIONS_COLLECTION, document).await {
            Ok(id) => id,
            Err(e) => {
                self.record(e);
                format!("conv_{}", now)
            }
        };
        conversation.last_message_at = Some(now);
        tracing::info!("[SYNC] Created conversation {} with {}", conversation.id, participant_id);

        self.cache.upsert_conversation(conversation.clone());
        self.select_conversation(&conversation.id).await?;
        self.render_conversations();
        Ok(conversation)
    }

    /// Reset a conversation's unread counter locally and in the store
    pub fn mark_read(&mut self, conversation_id: &str) {
        let had_unread = self
            .cache
            .conversation(conversation_id)
            .is_some_and(|c| c.unread_count > 0);
        self.cache.mark_read(conversation_id);
        if !had_unread {
            return;
        }

        let store = self.store.clone();
        let conversation_id = conversation_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store
                .update(CONVERSATIONS_COLLECTION, &conversation_id, json!({ "unreadCount": 0 }))
                .await
            {
                tracing::debug!("[SYNC] Unread reset not stored for {}: {}", conversation_id, e);
            }
        });
        self.render_conversations();
    }

    /// Write what the cache holds to the fallback file
    pub async fn save_fallback(&self, path: &Path) -> SyncResult<()> {
        self.cache.export().save(path).await
    }
}
