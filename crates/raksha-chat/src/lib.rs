//! raksha-chat: Chat session runtime
//!
//! This crate owns the conversation history and drives one streamed assistant
//! reply per turn, publishing immutable snapshots of the history as fragments
//! arrive.

pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod session;
pub mod transport;

pub use conversation::Conversation;
pub use error::{Error, Result};
pub use events::{ChatEvent, TurnOutcome};
pub use handle::ChatHandle;
pub use session::{ChatConfig, ChatSession};
pub use transport::{EdgeTransport, Transport};
