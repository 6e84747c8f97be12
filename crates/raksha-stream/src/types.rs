//! Core types for chat turns

use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle state of a message's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Content is final
    #[default]
    Complete,
    /// Assistant reply still receiving fragments
    Streaming,
    /// Stream stopped (failure or cancellation) before the end-of-stream signal
    Incomplete,
}

impl MessageStatus {
    /// Check if the message can no longer change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Streaming)
    }
}

/// A single entry of the conversation history.
///
/// Only `role` and `content` travel on the wire; status and timestamp are
/// local bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip)]
    pub status: MessageStatus,
    /// Creation time, epoch milliseconds
    #[serde(skip)]
    pub timestamp: i64,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), MessageStatus::Complete)
    }

    /// Create a finished assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), MessageStatus::Complete)
    }

    /// Create the empty assistant placeholder that fragments are appended to
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, String::new(), MessageStatus::Streaming)
    }

    fn new(role: Role, content: String, status: MessageStatus) -> Self {
        Self {
            role,
            content,
            status,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// One piece of assistant text extracted from a single stream event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
}

impl TextFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Request body sent to an assistant edge function.
///
/// The full history is replayed on every turn; the server keeps no session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

/// Concatenate fragments into the text they spell out
pub fn concat_fragments(fragments: &[TextFragment]) -> String {
    fragments.iter().map(TextFragment::as_str).collect()
}
