//! Optimistic sends: validation, echo reconciliation, failure and retry

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use schoolchat::client::{ChannelRenderer, RenderUpdate, SyncController};
use schoolchat::shared::messaging::DeliveryStatus;
use schoolchat::shared::{AppConfig, Document, EchoPolicy, SyncError, WriteFailurePolicy};
use schoolchat::store::{DocumentStore, LocalOnlyStore};

use crate::common::{controller_over, session_with, settle, wait_until, ScriptedStore};

async fn attached(store: &ScriptedStore) -> SyncController {
    let mut controller = controller_over(Arc::new(store.clone()));
    crate::assert_ok!(controller.select_conversation("c1").await);
    store.deliver_snapshot(0, Vec::new());
    controller.poll();
    controller
}

#[tokio::test]
async fn test_blank_body_never_appends_or_writes() {
    let store = ScriptedStore::new();
    let mut controller = attached(&store).await;

    for body in ["", "   ", "\n\t "] {
        crate::assert_err!(
            controller.send_message("c1", body),
            SyncError::InvalidInput { .. }
        );
    }
    settle(&mut controller).await;
    assert!(controller.messages("c1").is_empty());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_send_to_inactive_conversation_is_rejected() {
    let store = ScriptedStore::new();
    let mut controller = attached(&store).await;
    crate::assert_err!(controller.send_message("c2", "hi"), SyncError::InvalidInput { .. });
    assert!(controller.messages("c2").is_empty());
}

#[tokio::test]
async fn test_unreachable_store_send_is_visible_then_recorded() {
    let store = ScriptedStore::unreachable();
    let mut controller = attached(&store).await;

    let sent = crate::assert_ok!(controller.send_message("c1", "Hello teacher"));
    let visible = controller.messages("c1");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].status, DeliveryStatus::Sent);
    assert_eq!(visible[0].body.content(), "Hello teacher");
    assert!(controller.errors().is_empty(), "no error surfaces synchronously");

    wait_until(&mut controller, |c| !c.errors().is_empty()).await;
    let errors = controller.take_errors();
    assert_matches!(errors.as_slice(), [SyncError::RemoteUnavailable { .. }]);

    let visible = controller.messages("c1");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, sent.id);
    assert_eq!(visible[0].status, DeliveryStatus::Failed);
    assert_eq!(controller.pending_sends(), 1);
}

#[tokio::test]
async fn test_keep_sent_policy_leaves_status_alone() {
    let store = ScriptedStore::unreachable();
    let config = AppConfig::builder()
        .write_failure_policy(WriteFailurePolicy::KeepSent)
        .build()
        .unwrap();
    let mut controller = SyncController::new(
        Arc::new(store.clone()),
        session_with(config),
        Box::new(schoolchat::client::NoopRenderer),
    );
    crate::assert_ok!(controller.select_conversation("c1").await);

    crate::assert_ok!(controller.send_message("c1", "hi"));
    wait_until(&mut controller, |c| !c.errors().is_empty()).await;
    assert_eq!(controller.messages("c1")[0].status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn test_failed_send_can_be_retried() {
    let store = ScriptedStore::unreachable();
    let mut controller = attached(&store).await;

    let sent = crate::assert_ok!(controller.send_message("c1", "try again"));
    wait_until(&mut controller, |c| !c.errors().is_empty()).await;
    controller.take_errors();

    crate::assert_err!(
        controller.retry_message("c1", "local-unknown"),
        SyncError::NotFound { .. }
    );

    store.set_fail_writes(false);
    crate::assert_ok!(controller.retry_message("c1", &sent.id));
    assert_eq!(controller.messages("c1")[0].status, DeliveryStatus::Sent);
    // already back in flight
    crate::assert_err!(
        controller.retry_message("c1", &sent.id),
        SyncError::InvalidInput { .. }
    );

    wait_until(&mut controller, |c| c.pending_sends() == 0).await;
    let visible = controller.messages("c1");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "srv-1");
    assert!(controller.take_errors().is_empty());
}

#[tokio::test]
async fn test_write_carries_token_and_leaves_timestamp_to_store() {
    let store = ScriptedStore::new();
    let mut controller = attached(&store).await;

    let sent = crate::assert_ok!(controller.send_message("c1", "  padded  "));
    wait_until(&mut controller, |c| c.pending_sends() == 0).await;

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let (collection, doc) = &writes[0];
    assert_eq!(collection, "messages");
    assert_eq!(doc["content"], "padded");
    assert_eq!(doc["conversationId"], "c1");
    assert_eq!(doc["senderId"], "student1");
    assert!(doc["timestamp"].is_null());
    assert_eq!(doc["clientToken"].as_str(), sent.client_token.as_deref());

    let updates = store.updates();
    let (_, _, summary) = updates
        .iter()
        .find(|(collection, id, _)| collection == "conversations" && id == "c1")
        .expect("summary update");
    assert_eq!(summary["lastMessage"], "padded");
    assert_eq!(summary["lastMessageSender"], "student1");
    assert!(summary["timestamp"].is_null());
}

#[tokio::test]
async fn test_echo_after_confirmation_reconciles() {
    let store = ScriptedStore::new();
    let mut controller = attached(&store).await;

    let sent = crate::assert_ok!(controller.send_message("c1", "hello"));
    wait_until(&mut controller, |c| c.pending_sends() == 0).await;
    assert_eq!(controller.messages("c1")[0].id, "srv-1");

    let (_, mut written) = store.writes().remove(0);
    written["timestamp"] = serde_json::json!(sent.timestamp + 5);
    store.deliver_added(0, vec![Document::new("srv-1", written)]);
    controller.poll();

    let visible = controller.messages("c1");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "srv-1");
    assert_eq!(visible[0].timestamp, sent.timestamp + 5);
}

#[tokio::test]
async fn test_echo_before_confirmation_reconciles() {
    let store = ScriptedStore::new();
    let mut controller = attached(&store).await;

    let sent = crate::assert_ok!(controller.send_message("c1", "quick"));
    let mut echo = sent.to_write_document().unwrap();
    echo["timestamp"] = serde_json::json!(sent.timestamp);
    store.deliver_added(0, vec![Document::new("srv-echo", echo)]);
    controller.poll();

    let visible = controller.messages("c1");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "srv-echo");
    assert_eq!(controller.pending_sends(), 0);

    // the write's own confirmation arrives late and changes nothing
    settle(&mut controller).await;
    let visible = controller.messages("c1");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "srv-echo");
}

#[tokio::test]
async fn test_duplicate_policy_shows_echo_separately() {
    let store = ScriptedStore::new();
    let config = AppConfig::builder().echo_policy(EchoPolicy::Duplicate).build().unwrap();
    let mut controller = SyncController::new(
        Arc::new(store.clone()),
        session_with(config),
        Box::new(schoolchat::client::NoopRenderer),
    );
    crate::assert_ok!(controller.select_conversation("c1").await);
    store.deliver_snapshot(0, Vec::new());

    let sent = crate::assert_ok!(controller.send_message("c1", "twice"));
    settle(&mut controller).await;
    let echo = sent.to_write_document().unwrap();
    store.deliver_added(0, vec![Document::new("srv-1", echo)]);
    controller.poll();

    assert_eq!(controller.messages("c1").len(), 2);
}

#[tokio::test]
async fn test_renderer_sees_optimistic_entry_immediately() {
    let store = Arc::new(LocalOnlyStore::new());
    let (renderer, mut updates) = ChannelRenderer::new();
    let mut controller = SyncController::new(
        store.clone(),
        session_with(AppConfig::default()),
        Box::new(renderer),
    );
    crate::assert_ok!(controller.select_conversation("c1").await);
    while updates.try_recv().is_ok() {}

    crate::assert_ok!(controller.send_message("c1", "drawn now"));
    let first = updates.try_recv().unwrap();
    assert_matches!(
        first,
        RenderUpdate::Messages { ref conversation_id, ref messages }
            if conversation_id == "c1" && messages.len() == 1 && messages[0].is_local()
    );

    wait_until(&mut controller, |c| c.pending_sends() == 0 && !c.messages("c1")[0].is_local()).await;
    let stored = store
        .query(&schoolchat::store::StoreQuery::messages_of("c1"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(controller.messages("c1").len(), 1);
}
