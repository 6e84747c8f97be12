//! Incremental terminal output for a streamed reply

use raksha_chat::{ChatEvent, TurnOutcome};
use raksha_stream::{ChatMessage, Role};

/// Tracks how much of the current reply has been written out.
///
/// Text comes from history snapshots rather than single fragments, so events a
/// lagging receiver missed are recovered from the next snapshot, or from the
/// final history once the turn is over.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    started: bool,
    printed: usize,
}

impl ReplyPrinter {
    /// Reply text carried by `event` that has not been printed yet
    pub fn take_new_text<'a>(&mut self, event: &'a ChatEvent) -> Option<&'a str> {
        match event {
            ChatEvent::TurnStart { .. } => {
                self.started = true;
                self.printed = 0;
                None
            }
            ChatEvent::Snapshot { messages } if self.started => self.unprinted(messages),
            _ => None,
        }
    }

    /// Whatever part of the finished turn's reply never reached the terminal
    pub fn remaining<'a>(
        &mut self,
        messages: &'a [ChatMessage],
        outcome: &TurnOutcome,
    ) -> Option<&'a str> {
        let kept = match outcome {
            TurnOutcome::Completed => true,
            TurnOutcome::Failed { kept_partial, .. } | TurnOutcome::Cancelled { kept_partial } => {
                *kept_partial
            }
        };
        if !kept {
            return None;
        }
        self.unprinted(messages)
    }

    fn unprinted<'a>(&mut self, messages: &'a [ChatMessage]) -> Option<&'a str> {
        let reply = messages.last().filter(|msg| msg.role == Role::Assistant)?;
        let rest = reply.content.get(self.printed..)?;
        if rest.is_empty() {
            return None;
        }
        self.printed = reply.content.len();
        Some(rest)
    }
}
