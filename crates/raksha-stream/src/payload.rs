//! Typed decoding of a single `data:` payload

use serde::Deserialize;
use serde_json::{Value, error::Category};

/// Streaming chat-completion chunk, reduced to the fields we read.
///
/// Choices stay untyped so that only the first one has to match [`DeltaChoice`].
#[derive(Debug, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    choices: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of decoding one payload string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `choices[0].delta.content` was present and non-empty
    Fragment(String),
    /// Well-formed JSON without usable delta text
    NoFragment,
    /// Not parseable as JSON at all
    Desync,
}

impl Payload {
    /// Decode a payload string (already stripped of `data: ` and trimmed).
    pub fn parse(payload: &str) -> Self {
        match serde_json::from_str::<ChatDelta>(payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| serde_json::from_value::<DeltaChoice>(choice).ok())
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .filter(|text| !text.is_empty())
                .map_or(Payload::NoFragment, Payload::Fragment),
            Err(e) => match e.classify() {
                // Valid JSON, wrong shape
                Category::Data => Payload::NoFragment,
                Category::Syntax | Category::Eof | Category::Io => Payload::Desync,
            },
        }
    }
}
