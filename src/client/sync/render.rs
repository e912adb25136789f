//! Rendering adapter
//!
//! The UI side of the controller. Renderers only ever receive owned copies of
//! cache state, after each reconciliation.

use tokio::sync::mpsc;

use crate::shared::messaging::{ChatMessage, Conversation};

/// Receives redraw requests from the controller
pub trait RenderSink: Send {
    /// Full message list of the active conversation
    fn render_messages(&mut self, conversation_id: &str, messages: Vec<ChatMessage>);

    /// Conversation list, most recent first
    fn render_conversations(&mut self, conversations: Vec<Conversation>);
}

/// Renderer that draws nothing
#[derive(Debug, Default)]
pub struct NoopRenderer;

impl RenderSink for NoopRenderer {
    fn render_messages(&mut self, _conversation_id: &str, _messages: Vec<ChatMessage>) {}

    fn render_conversations(&mut self, _conversations: Vec<Conversation>) {}
}

/// One redraw request
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUpdate {
    Messages {
        conversation_id: String,
        messages: Vec<ChatMessage>,
    },
    Conversations(Vec<Conversation>),
}

/// Forwards redraws over a channel, e.g. to a UI thread
#[derive(Debug)]
pub struct ChannelRenderer {
    tx: mpsc::UnboundedSender<RenderUpdate>,
}

impl ChannelRenderer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, update: RenderUpdate) {
        if self.tx.send(update).is_err() {
            tracing::debug!("[RENDER] Receiver dropped, discarding update");
        }
    }
}

impl RenderSink for ChannelRenderer {
    fn render_messages(&mut self, conversation_id: &str, messages: Vec<ChatMessage>) {
        self.push(RenderUpdate::Messages {
            conversation_id: conversation_id.to_string(),
            messages,
        });
    }

    fn render_conversations(&mut self, conversations: Vec<Conversation>) {
        self.push(RenderUpdate::Conversations(conversations));
    }
}
