//! Fallback file and store selection

use std::sync::Arc;

use pretty_assertions::assert_eq;
use schoolchat::client::offline::FallbackSnapshot;
use schoolchat::shared::AppConfig;
use schoolchat::store::{open_store, DocumentStore, LocalOnlyStore, StoreKind, StoreQuery};

use crate::common::{controller_over, conversation_doc, message_doc, wait_until, ScriptedStore};

#[tokio::test]
async fn test_cache_round_trips_through_fallback_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("fallback.json");

    let store = ScriptedStore::new();
    store.insert("conversations", conversation_doc("c1", &["student1", "teacher"]));
    let mut controller = controller_over(Arc::new(store.clone()));
    crate::assert_ok!(controller.load_conversations().await);
    // subscription 0 follows the conversation list, 1 the opened conversation
    store.deliver_snapshot(
        1,
        vec![
            message_doc("m1", "c1", "teacher", "one", 100),
            message_doc("m2", "c1", "student1", "two", 200),
        ],
    );
    controller.poll();
    crate::assert_ok!(controller.save_fallback(&path).await);

    let snapshot = crate::assert_ok!(FallbackSnapshot::load(&path).await).unwrap();
    assert_eq!(snapshot.conversations.len(), 1);
    assert_eq!(snapshot.message_count(), 2);

    let local = LocalOnlyStore::from_snapshot(&snapshot, Some(path.clone())).await;
    let messages = local.query(&StoreQuery::messages_of("c1")).await.unwrap();
    let ids: Vec<&str> = messages.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_unreachable_server_falls_back_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fallback.json");

    let mut snapshot = FallbackSnapshot::default();
    let summary = schoolchat::shared::messaging::Conversation::new_direct("saved", "student1", "teacher");
    snapshot.insert_summary(summary);
    snapshot.push_message("saved", message_doc("s1", "saved", "teacher", "from disk", 10));
    snapshot.save(&path).await.unwrap();

    let config = AppConfig::builder()
        .server_url("http://127.0.0.1:9")
        .fallback_path(&path)
        .request_timeout_secs(1)
        .build()
        .unwrap();
    let opened = open_store(&config, Some("student1")).await;
    assert_eq!(opened.store.kind(), StoreKind::LocalOnly);
    assert!(opened.local.is_some());

    let mut controller = controller_over(opened.store.clone());
    let loaded = crate::assert_ok!(controller.load_conversations().await);
    assert_eq!(loaded.len(), 1, "file contents replace demo data");
    wait_until(&mut controller, |c| !c.messages("saved").is_empty()).await;
    assert_eq!(controller.messages("saved")[0].body.content(), "from disk");
}

#[tokio::test]
async fn test_empty_local_store_gets_demo_conversations() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::builder()
        .fallback_path(dir.path().join("missing.json"))
        .build()
        .unwrap();
    let opened = open_store(&config, Some("student1")).await;

    let mut controller = controller_over(opened.store.clone());
    let loaded = crate::assert_ok!(controller.load_conversations().await);
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].id, "demo-1");
    wait_until(&mut controller, |c| c.messages("demo-1").len() == 3).await;
    crate::assert_chronological!(controller.messages("demo-1"));

    // sends made offline persist with the store
    crate::assert_ok!(controller.send_message("demo-1", "Thank you!"));
    wait_until(&mut controller, |c| c.pending_sends() == 0).await;
    let local = opened.local.unwrap();
    crate::assert_ok!(local.persist().await);
    let saved = FallbackSnapshot::load(&dir.path().join("missing.json")).await.unwrap().unwrap();
    assert_eq!(saved.conversations["demo-1"].messages.len(), 4);
}
