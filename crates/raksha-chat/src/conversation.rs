//! Conversation history and the in-progress assistant reply

use std::sync::Arc;

use raksha_stream::{ChatMessage, ChatRequest, MessageStatus};

use crate::error::{Error, Result};

/// Ordered chat history.
///
/// At most one assistant message is streaming at a time, and when one is it
/// is always the last entry.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation, opening with an assistant greeting when given
    pub fn with_greeting(greeting: Option<&str>) -> Self {
        Self {
            messages: greeting
                .map(|text| ChatMessage::assistant(text))
                .into_iter()
                .collect(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether an assistant reply is still receiving fragments
    pub fn is_streaming(&self) -> bool {
        self.messages.last().is_some_and(ChatMessage::is_streaming)
    }

    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::Busy);
        }
        self.messages.push(ChatMessage::user(text));
        Ok(())
    }

    /// Request body replaying the whole history
    pub fn request(&self) -> ChatRequest {
        ChatRequest::new(self.messages.clone())
    }

    /// Append the empty placeholder that the next reply streams into
    pub fn begin_assistant(&mut self) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::Busy);
        }
        self.messages.push(ChatMessage::placeholder());
        Ok(())
    }

    /// Append a fragment to the in-progress reply.
    ///
    /// Returns `false` when no reply is streaming.
    pub fn append_fragment(&mut self, text: &str) -> bool {
        match self.streaming_mut() {
            Some(msg) => {
                msg.content.push_str(text);
                true
            }
            None => false,
        }
    }

    /// The reply reached its end-of-stream signal
    pub fn complete_assistant(&mut self) {
        if let Some(msg) = self.streaming_mut() {
            msg.status = MessageStatus::Complete;
        }
    }

    /// The reply stopped early.
    ///
    /// Content that already arrived is kept and marked incomplete; an empty
    /// placeholder is removed. Returns whether anything was kept.
    pub fn interrupt_assistant(&mut self) -> bool {
        let Some(msg) = self.streaming_mut() else {
            return false;
        };
        if msg.content.is_empty() {
            self.messages.pop();
            false
        } else {
            msg.status = MessageStatus::Incomplete;
            true
        }
    }

    /// Immutable copy of the history for publishing
    pub fn snapshot(&self) -> Arc<[ChatMessage]> {
        Arc::from(self.messages.as_slice())
    }

    fn streaming_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.last_mut().filter(|msg| msg.is_streaming())
    }
}
