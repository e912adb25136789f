//! Property-based tests for store queries

use proptest::prelude::*;
use schoolchat::shared::Document;
use schoolchat::store::{QueryParams, StoreQuery};
use serde_json::{json, Value};

fn documents() -> impl Strategy<Value = Vec<(Option<i64>, u8)>> {
    prop::collection::vec((prop::option::of(0i64..100), 0u8..3), 0..40)
}

proptest! {
    #[test]
    fn test_sort_orders_timestamps_with_missing_last(docs in documents()) {
        let query = StoreQuery::collection("messages").order_by("timestamp");
        let mut docs: Vec<Document> = docs
            .into_iter()
            .enumerate()
            .map(|(i, (ts, _))| {
                let ts = ts.map(Value::from).unwrap_or(Value::Null);
                Document::new(format!("d{}", i), json!({ "timestamp": ts }))
            })
            .collect();
        query.sort(&mut docs);

        let stamps: Vec<Option<i64>> = docs.iter().map(|d| d.field("timestamp").and_then(Value::as_i64)).collect();
        let first_missing = stamps.iter().position(Option::is_none).unwrap_or(stamps.len());
        prop_assert!(stamps[first_missing..].iter().all(Option::is_none));
        for pair in stamps[..first_missing].windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_filter_survives_query_string(docs in documents(), wanted in 0u8..3) {
        let conversation = format!("c{}", wanted);
        let query = StoreQuery::messages_of(&conversation);
        let decoded = QueryParams::from_query(&query).into_query("messages").unwrap();

        for (i, (_, conv)) in docs.iter().enumerate() {
            let doc = Document::new(format!("d{}", i), json!({ "conversationId": format!("c{}", conv) }));
            prop_assert_eq!(query.matches("messages", &doc), *conv == wanted);
            prop_assert_eq!(decoded.matches("messages", &doc), *conv == wanted);
            prop_assert!(!query.matches("conversations", &doc));
        }
    }
}
