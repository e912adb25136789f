//! Duplicate deliveries and resync snapshots

use std::sync::Arc;

use pretty_assertions::assert_eq;
use schoolchat::client::SyncPhase;

use crate::common::{controller_over, message_doc, ScriptedStore};

#[tokio::test]
async fn test_replayed_id_keeps_first_write() {
    let store = ScriptedStore::new();
    let mut controller = controller_over(Arc::new(store.clone()));
    crate::assert_ok!(controller.select_conversation("c1").await);

    store.deliver_snapshot(0, vec![message_doc("m1", "c1", "teacher", "hi", 100)]);
    controller.poll();
    store.deliver_added(0, vec![message_doc("m1", "c1", "teacher", "hi-dup", 100)]);
    controller.poll();

    let messages = controller.messages("c1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body.content(), "hi");
    assert_eq!(controller.phase(), SyncPhase::Synced);
}

#[tokio::test]
async fn test_resync_snapshot_merges_without_duplicates() {
    let store = ScriptedStore::new();
    let mut controller = controller_over(Arc::new(store.clone()));
    crate::assert_ok!(controller.select_conversation("c1").await);

    store.deliver_snapshot(
        0,
        vec![
            message_doc("m1", "c1", "teacher", "one", 100),
            message_doc("m2", "c1", "student1", "two", 200),
        ],
    );
    controller.poll();
    // reconnect: full snapshot again plus one newer message
    store.deliver_snapshot(
        0,
        vec![
            message_doc("m1", "c1", "teacher", "one", 100),
            message_doc("m2", "c1", "student1", "two", 200),
            message_doc("m3", "c1", "teacher", "three", 300),
        ],
    );
    controller.poll();

    let ids: Vec<String> = controller.messages("c1").into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_out_of_order_deltas_render_chronologically() {
    let store = ScriptedStore::new();
    let mut controller = controller_over(Arc::new(store.clone()));
    crate::assert_ok!(controller.select_conversation("c1").await);

    store.deliver_snapshot(0, Vec::new());
    store.deliver_added(0, vec![message_doc("late", "c1", "teacher", "second", 500)]);
    store.deliver_added(0, vec![message_doc("early", "c1", "teacher", "first", 100)]);
    store.deliver_added(0, vec![message_doc("tie", "c1", "teacher", "third", 500)]);
    assert_eq!(controller.poll(), 4);

    let messages = controller.messages("c1");
    crate::assert_chronological!(messages);
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    // equal timestamps keep arrival order
    assert_eq!(ids, vec!["early", "late", "tie"]);
    assert_eq!(controller.messages("c1"), messages);
}

#[tokio::test]
async fn test_malformed_and_foreign_documents_are_skipped() {
    let store = ScriptedStore::new();
    let mut controller = controller_over(Arc::new(store.clone()));
    crate::assert_ok!(controller.select_conversation("c1").await);

    let broken = schoolchat::shared::Document::new("bad", serde_json::json!({"content": 42}));
    store.deliver_snapshot(
        0,
        vec![
            broken,
            message_doc("other", "c9", "teacher", "wrong room", 50),
            message_doc("ok", "c1", "teacher", "fine", 60),
        ],
    );
    controller.poll();

    let messages = controller.messages("c1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "ok");
    assert!(controller.messages("c9").is_empty());
}
