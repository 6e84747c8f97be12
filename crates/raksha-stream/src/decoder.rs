//! Incremental `data:` line decoder
//!
//! [`SseDecoder`] is fed raw body chunks as they arrive and returns the text
//! fragments completed by each chunk. Chunk boundaries may fall anywhere:
//! inside a UTF-8 sequence, inside a line, or inside a JSON object. A line is
//! only interpreted once its terminating `\n` has been received.
//!
//! ```text
//! : keep-alive                                      -> skipped
//!                                                   -> skipped
//! event: message                                    -> skipped (not data)
//! data: {"choices":[{"delta":{"content":"Hi"}}]}   -> "Hi"
//! data: [DONE]                                      -> Done, rest ignored
//! ```

use crate::payload::Payload;
use crate::types::TextFragment;
use crate::utf8::Utf8Carry;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// What to do with a terminated `data:` line whose payload is not valid JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesyncPolicy {
    /// Drop the line and keep processing the lines after it.
    #[default]
    Skip,
    /// Put the line back at the front of the buffer and stop processing until
    /// the next chunk arrives. Any complete lines after it wait as well.
    Requeue,
}

/// Decoder tuning
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    pub desync: DesyncPolicy,
}

/// Decoder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Pulling chunks and extracting lines
    Reading,
    /// End-of-stream sentinel seen or source exhausted
    Done,
    /// The source failed mid-stream
    Failed,
}

impl DecoderState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecoderState::Reading)
    }
}

/// Result of interpreting one line
enum LineAction {
    Skip,
    Emit(String),
    Finish,
    Desync,
}

/// Incremental decoder for one streamed assistant reply
#[derive(Debug)]
pub struct SseDecoder {
    buffer: String,
    utf8: Utf8Carry,
    state: DecoderState,
    options: DecoderOptions,
    desyncs: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    /// Create a decoder with the default [`DesyncPolicy::Skip`] policy
    pub fn new() -> Self {
        Self::with_options(DecoderOptions::default())
    }

    pub fn with_options(options: DecoderOptions) -> Self {
        Self {
            buffer: String::new(),
            utf8: Utf8Carry::default(),
            state: DecoderState::Reading,
            options,
            desyncs: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Decoded text not yet resolved into a complete line
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Number of unparseable payloads encountered so far
    pub fn desync_count(&self) -> usize {
        self.desyncs
    }

    /// Feed one chunk of the response body.
    ///
    /// Returns the fragments completed by this chunk, in order. Once the
    /// decoder has left [`DecoderState::Reading`] further chunks are ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<TextFragment> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.utf8.decode_into(chunk, &mut self.buffer);
        self.drain_lines()
    }

    /// Signal that the source is exhausted.
    ///
    /// Any unterminated trailing text is discarded; it never becomes a fragment.
    pub fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.utf8.finish(&mut self.buffer);
        if !self.buffer.trim().is_empty() {
            tracing::debug!(
                "Discarding {} bytes of unterminated stream data",
                self.buffer.len()
            );
        }
        self.buffer.clear();
        self.state = DecoderState::Done;
    }

    /// Mark the decode as failed; the buffer is dropped.
    pub fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.buffer.clear();
        self.state = DecoderState::Failed;
    }

    fn drain_lines(&mut self) -> Vec<TextFragment> {
        let mut fragments = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            match interpret_line(&line) {
                LineAction::Skip => {}
                LineAction::Emit(text) => fragments.push(TextFragment { text }),
                LineAction::Finish => {
                    self.buffer.clear();
                    self.state = DecoderState::Done;
                    break;
                }
                LineAction::Desync => {
                    self.desyncs += 1;
                    match self.options.desync {
                        DesyncPolicy::Skip => {
                            tracing::debug!("Skipping unparseable stream line: {}", line);
                        }
                        DesyncPolicy::Requeue => {
                            tracing::debug!("Requeueing unparseable stream line until next read");
                            line.push('\n');
                            self.buffer.insert_str(0, &line);
                            break;
                        }
                    }
                }
            }
        }

        fragments
    }
}

fn interpret_line(line: &str) -> LineAction {
    if line.trim().is_empty() || line.starts_with(':') {
        return LineAction::Skip;
    }
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return LineAction::Skip;
    };

    let payload = rest.trim();
    if payload == DONE_SENTINEL {
        return LineAction::Finish;
    }

    match Payload::parse(payload) {
        Payload::Fragment(text) => LineAction::Emit(text),
        Payload::NoFragment => LineAction::Skip,
        Payload::Desync => LineAction::Desync,
    }
}
