//! A cloneable handle for poking a chat session from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking a chat session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct ChatHandle {
    cancel: Arc<Mutex<CancellationToken>>,
    is_streaming: Arc<AtomicBool>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the session busy and hand out the token for this turn.
    ///
    /// The token is the one armed by the previous `end_turn`, so an abort
    /// that lands just before the turn starts still applies to it.
    pub(crate) fn begin_turn(&self) -> CancellationToken {
        self.is_streaming.store(true, Ordering::Release);
        self.cancel.lock().clone()
    }

    /// Arm a fresh token for the next turn and mark the session idle.
    pub(crate) fn end_turn(&self) {
        *self.cancel.lock() = CancellationToken::new();
        self.is_streaming.store(false, Ordering::Release);
    }

    /// Abort the in-flight turn, or the next one if no turn is running.
    /// Fragments already received stay in the history.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a reply is streaming; the send control should be disabled while true.
    pub fn is_streaming(&self) -> bool {
        self.is_streaming.load(Ordering::Acquire)
    }
}
