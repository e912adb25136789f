//! Controller and subscriptions over HTTP

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use schoolchat::client::{NoopRenderer, SessionContext, SyncController, UserIdentity};
use schoolchat::shared::{AppConfig, ChangeKind, SubscriptionPayload};
use schoolchat::store::{open_store, DocumentStore, StoreKind, StoreQuery};
use serde_json::json;
use tokio::sync::mpsc;

use super::TestServer;
use crate::common::{student, wait_until};

async fn next_payload(rx: &mut mpsc::UnboundedReceiver<schoolchat::shared::StoreEvent>) -> SubscriptionPayload {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for subscription frame")
        .expect("subscription channel closed")
        .payload
}

#[tokio::test]
async fn test_subscription_emits_snapshot_then_changes_in_order() {
    let server = TestServer::start().await;
    let store = server.store();
    store
        .write("messages", json!({"conversationId": "c1", "content": "before"}))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = store.subscribe(StoreQuery::messages_of("c1"), tx).await.unwrap();

    match next_payload(&mut rx).await {
        SubscriptionPayload::Snapshot { documents } => {
            assert_eq!(documents.len(), 1);
            assert_eq!(documents[0].data["content"], "before");
        }
        other => panic!("Expected Snapshot, got {:?}", other),
    }

    for text in ["one", "two", "three"] {
        store
            .write("messages", json!({"conversationId": "c1", "content": text, "timestamp": null}))
            .await
            .unwrap();
    }
    store
        .write("messages", json!({"conversationId": "other", "content": "filtered"}))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while seen.len() < 3 {
        match next_payload(&mut rx).await {
            SubscriptionPayload::Changes { changes } => {
                for change in changes {
                    assert_eq!(change.kind, ChangeKind::Added);
                    seen.push(change.document.data["content"].as_str().unwrap().to_string());
                }
            }
            other => panic!("Expected Changes, got {:?}", other),
        }
    }
    assert_eq!(seen, vec!["one", "two", "three"]);

    handle.cancel();
    assert!(handle.is_cancelled());
}

#[tokio::test]
async fn test_open_store_prefers_reachable_server() {
    let server = TestServer::start().await;
    let config = AppConfig::builder().server_url(&server.url).build().unwrap();
    let opened = open_store(&config, Some("student1")).await;
    assert_eq!(opened.store.kind(), StoreKind::Remote);
    assert!(opened.local.is_none());
    assert!(server.documents.is_empty().await, "no demo data is pushed to a live server");
}

#[tokio::test]
async fn test_two_clients_exchange_messages() {
    let server = TestServer::start().await;

    let mut sara = SyncController::new(
        Arc::new(server.store()),
        SessionContext::new(Some(student()), AppConfig::default()),
        Box::new(NoopRenderer),
    );
    let conversation = crate::assert_ok!(sara.create_conversation("teacher_arabic", Some("Mr. Ahmed")).await);
    assert!(!conversation.id.starts_with("conv_"));
    wait_until(&mut sara, |c| c.phase() == schoolchat::client::SyncPhase::Synced).await;

    let sent = crate::assert_ok!(sara.send_message(&conversation.id, "Salam, I finished exercise 5"));
    wait_until(&mut sara, |c| c.pending_sends() == 0).await;
    let mine = sara.messages(&conversation.id);
    assert_eq!(mine.len(), 1, "echo reconciles with the optimistic entry");
    assert!(!mine[0].is_local());
    assert_eq!(mine[0].client_token, sent.client_token);

    // the summary update runs after the message write
    let observer = server.store();
    for _ in 0..100 {
        let docs = observer.query(&StoreQuery::conversations_of("teacher_arabic")).await.unwrap();
        if docs.first().is_some_and(|d| d.data["lastMessage"] == "Salam, I finished exercise 5") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut teacher = SyncController::new(
        Arc::new(server.store()),
        SessionContext::new(Some(UserIdentity::new("teacher_arabic", "Mr. Ahmed")), AppConfig::default()),
        Box::new(NoopRenderer),
    );
    let listed = crate::assert_ok!(teacher.load_conversations().await);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].last_message_preview, "Salam, I finished exercise 5");
    wait_until(&mut teacher, |c| c.messages(&conversation.id).len() == 1).await;

    crate::assert_ok!(teacher.send_message(&conversation.id, "Great, what is the question?"));
    wait_until(&mut sara, |c| c.messages(&conversation.id).len() == 2).await;
    let thread = sara.messages(&conversation.id);
    crate::assert_chronological!(thread);
    assert_eq!(thread[1].sender_id, "teacher_arabic");
    assert!(sara.take_errors().is_empty());
}
