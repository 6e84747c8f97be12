//! Chat event types

use std::sync::Arc;

use raksha_stream::ChatMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The reply streamed to its end
    Completed,
    /// The request or the stream failed
    Failed { reason: String, kept_partial: bool },
    /// The caller aborted the turn
    Cancelled { kept_partial: bool },
}

/// Events emitted while a session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A turn started
    TurnStart { turn_id: Uuid },

    /// The history changed; carries a copy that will never be mutated
    Snapshot { messages: Arc<[ChatMessage]> },

    /// One fragment of the reply arrived
    Fragment { text: String },

    /// A turn finished
    TurnEnd { turn_id: Uuid, outcome: TurnOutcome },

    /// Something the user should be told about (a failed turn)
    Notification { message: String },
}
