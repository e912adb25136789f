//! Sample conversations for a fresh local store

use crate::shared::error::SyncResult;
use crate::shared::event::Document;
use crate::shared::messaging::{
    ChatMessage, Conversation, DeliveryStatus, MessageBody, CONVERSATIONS_COLLECTION, MESSAGES_COLLECTION,
};
use crate::store::LocalOnlyStore;

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Three conversations: two teachers and the principal
pub fn seed_conversations(user_id: &str, now: i64) -> Vec<Conversation> {
    let mut arabic = Conversation::new_direct("demo-1", user_id, "teacher_arabic")
        .with_name("Mr. Ahmed Mohamed")
        .with_kind("teacher");
    arabic.last_message_preview = "Have you finished the homework exercises?".to_string();
    arabic.last_message_at = Some(now - 50 * 60_000);
    arabic.unread_count = 2;

    let mut science = Conversation::new_direct("demo-2", user_id, "teacher_science")
        .with_name("Ms. Fatima Ali")
        .with_kind("teacher");
    science.last_message_preview = "The science test results are ready".to_string();
    science.last_message_at = Some(now - DAY_MS);

    let mut principal = Conversation::new_direct("demo-3", user_id, "admin")
        .with_name("School Principal")
        .with_kind("admin");
    principal.last_message_preview = "Parents' meeting on Thursday".to_string();
    principal.last_message_at = Some(now - 2 * DAY_MS);

    vec![arabic, science, principal]
}

/// Short exchange for the first sample conversation
pub fn seed_messages(conversation_id: &str, user_id: &str, now: i64) -> Vec<ChatMessage> {
    let line = |id: &str, sender: &str, name: Option<&str>, text: &str, ago: i64, status| ChatMessage {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender.to_string(),
        sender_name: name.map(str::to_string),
        body: MessageBody::text(text),
        timestamp: now - ago,
        status,
        client_token: None,
    };
    vec![
        line(
            "demo-1-1",
            "teacher_arabic",
            Some("Mr. Ahmed Mohamed"),
            "Hello, have you finished the homework exercises?",
            HOUR_MS,
            DeliveryStatus::Read,
        ),
        line(
            "demo-1-2",
            user_id,
            None,
            "Yes, most of them, but I have a question about exercise 5",
            55 * 60_000,
            DeliveryStatus::Read,
        ),
        line(
            "demo-1-3",
            "teacher_arabic",
            Some("Mr. Ahmed Mohamed"),
            "Of course, what is your question?",
            50 * 60_000,
            DeliveryStatus::Delivered,
        ),
    ]
}

fn documents<T>(items: &[T], to_doc: impl Fn(&T) -> SyncResult<Document>) -> Vec<Document> {
    items
        .iter()
        .filter_map(|item| match to_doc(item) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!("[DEMO] Skipping sample document: {}", e);
                None
            }
        })
        .collect()
}

/// Load the sample data into a local store
pub async fn seed_store(store: &LocalOnlyStore, user_id: &str) {
    let now = chrono::Utc::now().timestamp_millis();
    let conversations = seed_conversations(user_id, now);
    let messages = seed_messages(&conversations[0].id, user_id, now);

    store
        .load(CONVERSATIONS_COLLECTION, documents(&conversations, Conversation::to_document))
        .await;
    store
        .load(MESSAGES_COLLECTION, documents(&messages, ChatMessage::to_document))
        .await;
    tracing::info!(
        "[DEMO] Seeded {} conversations and {} messages for {}",
        conversations.len(),
        messages.len(),
        user_id
    );
}
