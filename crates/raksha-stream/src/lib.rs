//! raksha-stream: Incremental decoding of streamed chat replies
//!
//! This crate turns the server-sent-event body returned by the assistant edge
//! functions into an ordered sequence of text fragments, and provides the
//! HTTP client that opens those streams.

pub mod client;
pub mod decoder;
pub mod error;
pub mod payload;
pub mod stream;
pub mod types;
mod utf8;

pub use client::{Assistant, EdgeFunctionClient};
pub use decoder::{DecoderOptions, DecoderState, DesyncPolicy, SseDecoder};
pub use error::{Error, Result};
pub use stream::{ByteStream, FragmentStream, decode, decode_with};
pub use types::*;
