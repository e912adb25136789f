//! Messaging Module
//!
//! Data structures for the messaging system:
//!
//! - `ChatMessage` - A message in a conversation
//! - `Conversation` - A conversation between users
//!
//! # Usage
//!
//! ```rust
//! use schoolchat::shared::messaging::{ChatMessage, Conversation};
//!
//! let conv = Conversation::new_direct("c1", "alice", "bob");
//! let msg = ChatMessage::new_text(&conv.id, "alice", "hello");
//! assert_eq!(msg.conversation_id, "c1");
//! ```

pub mod conversation;
pub mod message;

/// Collection holding conversation summaries
pub const CONVERSATIONS_COLLECTION: &str = "conversations";

/// Collection holding messages
pub const MESSAGES_COLLECTION: &str = "messages";

// Re-export all types
pub use conversation::Conversation;
pub use message::{truncate_preview, ChatMessage, DeliveryStatus, MessageBody, LOCAL_ID_PREFIX};
