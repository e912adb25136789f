//! Property-based tests for the local cache
//!
//! Uses proptest to generate random delivery sequences and verify the
//! deduplication and ordering laws.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use schoolchat::client::LocalCache;
use schoolchat::shared::messaging::{truncate_preview, ChatMessage};

fn message(id: u8, timestamp: i64, text: &str) -> ChatMessage {
    let mut m = ChatMessage::new_text("c1", "u1", text);
    m.id = format!("m{}", id);
    m.timestamp = timestamp;
    m
}

fn deliveries() -> impl Strategy<Value = Vec<(u8, i64, String)>> {
    prop::collection::vec((0u8..12, 0i64..40, "[a-z]{1,6}"), 0..60)
}

proptest! {
    #[test]
    fn test_count_equals_distinct_ids(seq in deliveries()) {
        let mut cache = LocalCache::new();
        for (id, ts, text) in &seq {
            cache.append_message("c1", message(*id, *ts, text));
        }
        let distinct: HashSet<u8> = seq.iter().map(|(id, _, _)| *id).collect();
        prop_assert_eq!(cache.message_count("c1"), distinct.len());
        prop_assert_eq!(cache.list_messages("c1").len(), distinct.len());
    }

    #[test]
    fn test_first_write_wins(seq in deliveries()) {
        let mut cache = LocalCache::new();
        let mut first: HashMap<String, String> = HashMap::new();
        for (id, ts, text) in &seq {
            let m = message(*id, *ts, text);
            first.entry(m.id.clone()).or_insert_with(|| text.clone());
            cache.append_message("c1", m);
        }
        for m in cache.list_messages("c1") {
            prop_assert_eq!(Some(m.body.content()), first.get(&m.id).map(String::as_str));
        }
    }

    #[test]
    fn test_listing_is_ordered_and_stable(seq in deliveries()) {
        let mut cache = LocalCache::new();
        let mut arrival: Vec<String> = Vec::new();
        for (id, ts, text) in &seq {
            let m = message(*id, *ts, text);
            let m_id = m.id.clone();
            if cache.append_message("c1", m) {
                arrival.push(m_id);
            }
        }
        let listed = cache.list_messages("c1");
        for pair in listed.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            if pair[0].timestamp == pair[1].timestamp {
                let a = arrival.iter().position(|id| *id == pair[0].id);
                let b = arrival.iter().position(|id| *id == pair[1].id);
                prop_assert!(a < b, "ties keep arrival order");
            }
        }
        prop_assert_eq!(cache.list_messages("c1"), listed);
    }

    #[test]
    fn test_conversations_never_leak(
        a in prop::collection::vec((0u8..8, 0i64..20), 0..20),
        b in prop::collection::vec((0u8..8, 0i64..20), 0..20),
    ) {
        let mut cache = LocalCache::new();
        for (id, ts) in &a {
            let mut m = message(*id, *ts, "a");
            m.conversation_id = "A".to_string();
            cache.append_message("A", m);
        }
        for (id, ts) in &b {
            let mut m = message(*id, *ts, "b");
            m.conversation_id = "B".to_string();
            cache.append_message("B", m);
        }
        prop_assert!(cache.list_messages("A").iter().all(|m| m.conversation_id == "A"));
        prop_assert!(cache.list_messages("B").iter().all(|m| m.conversation_id == "B"));
        cache.clear_conversation("A");
        let b_ids: HashSet<&u8> = b.iter().map(|(id, _)| id).collect();
        prop_assert_eq!(cache.message_count("B"), b_ids.len());
    }

    #[test]
    fn test_rekey_never_duplicates(ids in prop::collection::vec(0u8..6, 1..12), target in 0u8..6) {
        let mut cache = LocalCache::new();
        for (ts, id) in ids.iter().enumerate() {
            cache.append_message("c1", message(*id, ts as i64, "x"));
        }
        let first = format!("m{}", ids[0]);
        cache.rekey_message("c1", &first, &format!("m{}", target));
        let listed = cache.list_messages("c1");
        let unique: HashSet<&str> = listed.iter().map(|m| m.id.as_str()).collect();
        prop_assert_eq!(unique.len(), listed.len());
    }

    #[test]
    fn test_preview_respects_length(text in "\\PC{0,120}", max_len in 0usize..80) {
        let preview = truncate_preview(&text, max_len);
        prop_assert!(preview.chars().count() <= max_len);
        if text.chars().count() <= max_len {
            prop_assert_eq!(preview, text);
        }
    }
}
