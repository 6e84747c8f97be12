//! Chat session: one streamed assistant reply per turn

use std::sync::Arc;

use futures::StreamExt;
use raksha_stream::{ChatMessage, ChatRequest};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    conversation::Conversation,
    error::{Error, Result, notification_for},
    events::{ChatEvent, TurnOutcome},
    handle::ChatHandle,
    transport::Transport,
};

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    /// Assistant message shown at the top of a fresh conversation
    pub greeting: Option<String>,
}

/// Drives a conversation with one assistant.
///
/// `send` borrows the session mutably, so a conversation never has more than
/// one reply decoding at a time.
pub struct ChatSession {
    config: ChatConfig,
    conversation: Conversation,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

impl ChatSession {
    /// Create a new session
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let conversation = Conversation::with_greeting(config.greeting.as_deref());
        Self {
            config,
            conversation,
            transport,
            event_tx,
            handle: ChatHandle::new(),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle (abort, busy state)
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    /// Whether a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.handle.is_streaming()
    }

    /// Reset the conversation (the greeting, if any, is restored)
    pub fn clear(&mut self) {
        self.conversation = Conversation::with_greeting(self.config.greeting.as_deref());
        self.publish_snapshot();
    }

    /// Send a user message and stream the assistant's reply into the history.
    ///
    /// Transport and stream failures do not return `Err`: they end the turn
    /// with [`TurnOutcome::Failed`] and a [`ChatEvent::Notification`], leaving
    /// the session ready for the next message.
    ///
    /// Dropping the returned future abandons the turn: the session goes idle at
    /// once, and the next `send` closes the abandoned reply like a cancelled one.
    pub async fn send(&mut self, input: &str) -> Result<TurnOutcome> {
        let text = input.trim();
        if text.is_empty() {
            return Err(Error::EmptyMessage);
        }

        self.recover_abandoned_turn();
        self.conversation.push_user(text)?;
        let request = self.conversation.request();
        self.conversation.begin_assistant()?;

        let turn_id = Uuid::new_v4();
        let cancel = self.handle.begin_turn();
        let guard = TurnGuard(self.handle.clone());
        self.emit(ChatEvent::TurnStart { turn_id });
        self.publish_snapshot();

        let span = tracing::debug_span!("chat_turn", %turn_id, history = request.messages.len());
        let outcome = self.run_turn(request, cancel).instrument(span).await;

        drop(guard);
        self.emit(ChatEvent::TurnEnd {
            turn_id,
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    async fn run_turn(&mut self, request: ChatRequest, cancel: CancellationToken) -> TurnOutcome {
        let transport = Arc::clone(&self.transport);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = transport.open(&request) => Some(result),
        };

        let mut fragments = match opened {
            None => return self.cancel_turn(),
            Some(Ok(fragments)) => fragments,
            Some(Err(e)) => return self.fail_turn(e),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancel_turn(),
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    self.conversation.append_fragment(fragment.as_str());
                    self.emit(ChatEvent::Fragment {
                        text: fragment.text,
                    });
                    self.publish_snapshot();
                }
                Some(Err(e)) => return self.fail_turn(e),
                None => {
                    self.conversation.complete_assistant();
                    self.publish_snapshot();
                    tracing::debug!("Reply complete");
                    return TurnOutcome::Completed;
                }
            }
        }
    }

    fn fail_turn(&mut self, error: raksha_stream::Error) -> TurnOutcome {
        tracing::warn!("Chat turn failed: {}", error);
        let kept_partial = self.conversation.interrupt_assistant();
        self.publish_snapshot();
        self.emit(ChatEvent::Notification {
            message: notification_for(&error),
        });
        TurnOutcome::Failed {
            reason: error.to_string(),
            kept_partial,
        }
    }

    fn cancel_turn(&mut self) -> TurnOutcome {
        tracing::debug!("Chat turn cancelled");
        let kept_partial = self.conversation.interrupt_assistant();
        self.publish_snapshot();
        TurnOutcome::Cancelled { kept_partial }
    }

    /// Close a reply left streaming by a `send` future that was dropped
    fn recover_abandoned_turn(&mut self) {
        if self.conversation.is_streaming() {
            tracing::debug!("Closing reply abandoned by a dropped send");
            self.conversation.interrupt_assistant();
            self.publish_snapshot();
        }
    }

    fn publish_snapshot(&self) {
        self.emit(ChatEvent::Snapshot {
            messages: self.conversation.snapshot(),
        });
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Marks the handle idle when the turn ends, including when `send` is dropped
struct TurnGuard(ChatHandle);

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.0.end_turn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use raksha_stream::{FragmentStream, MessageStatus, Role, TextFragment};

    /// One scripted reply: either a failure before streaming, or body chunks
    enum Reply {
        Fail(raksha_stream::Error),
        Body(Vec<std::result::Result<&'static str, &'static str>>),
        /// One fragment, then a stream that never ends
        Hang(&'static str),
    }

    /// A mock transport that replays scripted replies and records requests.
    struct MockTransport {
        replies: Mutex<Vec<Reply>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockTransport {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self, request: &ChatRequest) -> raksha_stream::Result<FragmentStream> {
            self.requests.lock().push(request.clone());
            let reply = {
                let mut replies = self.replies.lock();
                if replies.is_empty() {
                    Reply::Body(vec![Ok("data: [DONE]\n")])
                } else {
                    replies.remove(0)
                }
            };

            match reply {
                Reply::Fail(e) => Err(e),
                Reply::Body(chunks) => {
                    let body = chunks.into_iter().map(|chunk| match chunk {
                        Ok(text) => Ok(Bytes::from_static(text.as_bytes())),
                        Err(reason) => Err(raksha_stream::Error::Decode(reason.to_string())),
                    });
                    Ok(raksha_stream::decode(Box::pin(futures::stream::iter(body))))
                }
                Reply::Hang(text) => Ok(Box::pin(async_stream::stream! {
                    yield Ok::<_, raksha_stream::Error>(TextFragment::new(text));
                    futures::future::pending::<()>().await;
                })),
            }
        }
    }

    const THE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"The\"}}]}\n";
    const END: &str = "data: {\"choices\":[{\"delta\":{\"content\":\" end\"}}]}\n";
    const DONE: &str = "data: [DONE]\n";

    fn make_session(replies: Vec<Reply>) -> (ChatSession, Arc<MockTransport>) {
        let transport = MockTransport::new(replies);
        let session = ChatSession::new(ChatConfig::default(), transport.clone());
        (session, transport)
    }

    fn drain(rx: &mut broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_completed_turn_builds_reply() {
        let (mut session, _) = make_session(vec![Reply::Body(vec![Ok(THE), Ok(END), Ok(DONE)])]);

        let outcome = session.send("What does the end say?").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);

        let msgs = session.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].content, "The end");
        assert_eq!(msgs[1].status, MessageStatus::Complete);
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn test_snapshot_after_every_fragment() {
        let (mut session, _) = make_session(vec![Reply::Body(vec![Ok(THE), Ok(END), Ok(DONE)])]);
        let mut rx = session.subscribe();

        session.send("go").await.unwrap();
        let events = drain(&mut rx);

        let streamed: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Snapshot { messages } => messages.last().map(|m| m.content.clone()),
                _ => None,
            })
            .collect();
        // placeholder, "The", "The end", completed
        assert_eq!(streamed, ["", "The", "The end", "The end"]);

        let lengths: Vec<usize> = streamed.iter().map(String::len).collect();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));

        assert!(matches!(events.first(), Some(ChatEvent::TurnStart { .. })));
        assert!(matches!(events.last(), Some(ChatEvent::TurnEnd { .. })));
    }

    #[tokio::test]
    async fn test_request_failure_removes_placeholder() {
        let (mut session, _) = make_session(vec![Reply::Fail(raksha_stream::Error::request(
            429,
            "Rate limits exceeded, please try again later.",
        ))]);
        let mut rx = session.subscribe();

        let outcome = session.send("help").await.unwrap();
        assert!(matches!(
            outcome,
            TurnOutcome::Failed {
                kept_partial: false,
                ..
            }
        ));

        let msgs = session.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);

        let notified = drain(&mut rx).into_iter().any(|e| {
            matches!(e, ChatEvent::Notification { message } if message == "Rate limits exceeded, please try again later.")
        });
        assert!(notified);
    }

    #[tokio::test]
    async fn test_missing_body_treated_as_request_failure() {
        let (mut session, _) = make_session(vec![Reply::Fail(raksha_stream::Error::MissingBody)]);
        let outcome = session.send("help").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { kept_partial: false, .. }));
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_partial_reply() {
        let (mut session, _) =
            make_session(vec![Reply::Body(vec![Ok(THE), Err("connection reset")])]);

        let outcome = session.send("go").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { kept_partial: true, .. }));

        let last = session.messages().last().unwrap();
        assert_eq!(last.content, "The");
        assert_eq!(last.status, MessageStatus::Incomplete);
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn test_decode_failure_before_content_removes_placeholder() {
        let (mut session, _) = make_session(vec![Reply::Body(vec![
            Ok(": ping\n"),
            Err("connection reset"),
        ])]);

        let outcome = session.send("go").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { kept_partial: false, .. }));
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_session_usable_after_failure() {
        let (mut session, _) = make_session(vec![
            Reply::Fail(raksha_stream::Error::request(500, "boom")),
            Reply::Body(vec![Ok(THE), Ok(DONE)]),
        ]);

        session.send("first").await.unwrap();
        let outcome = session.send("second").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "The"]);
    }

    #[tokio::test]
    async fn test_history_replayed_each_turn() {
        let (mut session, transport) = make_session(vec![
            Reply::Body(vec![Ok(THE), Ok(DONE)]),
            Reply::Body(vec![Ok(END), Ok(DONE)]),
        ]);

        session.send("one").await.unwrap();
        session.send("two").await.unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 1);

        let second: Vec<(Role, &str)> = requests[1]
            .messages
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            second,
            [
                (Role::User, "one"),
                (Role::Assistant, "The"),
                (Role::User, "two")
            ]
        );
    }

    #[tokio::test]
    async fn test_abort_keeps_received_fragments() {
        let (mut session, _) = make_session(vec![Reply::Hang("Stay calm")]);
        let mut rx = session.subscribe();
        let handle = session.handle();

        let aborter = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if matches!(event, ChatEvent::Fragment { .. }) {
                    handle.abort();
                    break;
                }
            }
        });

        let outcome = session.send("chest pain").await.unwrap();
        aborter.await.unwrap();

        assert_eq!(outcome, TurnOutcome::Cancelled { kept_partial: true });
        let last = session.messages().last().unwrap();
        assert_eq!(last.content, "Stay calm");
        assert_eq!(last.status, MessageStatus::Incomplete);
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn test_abort_before_send_cancels_that_turn() {
        let (mut session, transport) = make_session(vec![Reply::Body(vec![Ok(THE), Ok(DONE)])]);
        session.handle().abort();

        let outcome = session.send("bleeding").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled { kept_partial: false });
        assert_eq!(session.messages().len(), 1);
        assert!(transport.requests.lock().is_empty());

        // The abort is spent; the next turn runs normally
        let outcome = session.send("bleeding").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);
    }

    #[tokio::test]
    async fn test_dropped_send_does_not_block_next_turn() {
        let (mut session, _) = make_session(vec![
            Reply::Hang("Apply pressure"),
            Reply::Body(vec![Ok(THE), Ok(DONE)]),
        ]);

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(50), session.send("one")).await;
        assert!(abandoned.is_err());
        assert!(!session.is_streaming());

        let outcome = session.send("two").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);

        let history: Vec<(&str, MessageStatus)> = session
            .messages()
            .iter()
            .map(|m| (m.content.as_str(), m.status))
            .collect();
        assert_eq!(
            history,
            [
                ("one", MessageStatus::Complete),
                ("Apply pressure", MessageStatus::Incomplete),
                ("two", MessageStatus::Complete),
                ("The", MessageStatus::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (mut session, transport) = make_session(vec![]);
        assert!(matches!(session.send("   ").await, Err(Error::EmptyMessage)));
        assert!(session.messages().is_empty());
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_greeting_seeds_and_survives_clear() {
        let transport = MockTransport::new(vec![Reply::Body(vec![Ok(THE), Ok(DONE)])]);
        let config = ChatConfig {
            greeting: Some("Hi, I'm Raksha. How can I help?".into()),
        };
        let mut session = ChatSession::new(config, transport.clone());
        assert_eq!(session.messages().len(), 1);

        session.send("hello").await.unwrap();
        assert_eq!(transport.requests.lock()[0].messages.len(), 2);
        assert_eq!(session.messages().len(), 3);

        session.clear();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::Assistant);
    }
}
