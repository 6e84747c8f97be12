//! Lazy fragment streams over response bodies

use std::pin::Pin;

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::decoder::{DecoderOptions, DecoderState, SseDecoder};
use crate::error::{Error, Result};
use crate::types::TextFragment;

/// A response body delivered in arbitrary-sized chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The text fragments of one assistant reply.
///
/// Ends with `None` once the reply is complete. A failed read yields a single
/// `Err(Error::Decode)` and then ends; fragments yielded before it stand.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<TextFragment>> + Send>>;

/// Decode a body with the default options
pub fn decode(body: ByteStream) -> FragmentStream {
    decode_with(body, DecoderOptions::default())
}

/// Decode a body into a lazy, non-restartable fragment stream
pub fn decode_with(mut body: ByteStream, options: DecoderOptions) -> FragmentStream {
    Box::pin(stream! {
        let mut decoder = SseDecoder::with_options(options);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for fragment in decoder.push(&bytes) {
                        yield Ok(fragment);
                    }
                    if decoder.state() == DecoderState::Done {
                        // Sentinel seen; anything still in flight is ignored
                        return;
                    }
                }
                Err(e) => {
                    decoder.fail();
                    tracing::warn!("Chat stream read failed: {}", e);
                    let message = match e {
                        Error::Decode(message) => message,
                        other => other.to_string(),
                    };
                    yield Err(Error::Decode(message));
                    return;
                }
            }
        }

        decoder.finish();
    })
}
