//! Offline decoding of captured reply streams

use std::path::Path;

use anyhow::Context;
use raksha_stream::{DecoderOptions, DecoderState, SseDecoder, TextFragment};

/// What a captured body decodes to
#[derive(Debug)]
pub struct DecodeReport {
    pub fragments: Vec<TextFragment>,
    pub desyncs: usize,
    pub state: DecoderState,
}

impl DecodeReport {
    pub fn text(&self) -> String {
        raksha_stream::concat_fragments(&self.fragments)
    }
}

/// Feed `bytes` to a decoder in reads of `chunk_size` bytes (the whole body when `None`)
pub fn decode_bytes(bytes: &[u8], chunk_size: Option<usize>, options: DecoderOptions) -> DecodeReport {
    let mut decoder = SseDecoder::with_options(options);
    let mut fragments = Vec::new();
    let size = chunk_size.unwrap_or(bytes.len()).max(1);

    for chunk in bytes.chunks(size) {
        fragments.extend(decoder.push(chunk));
        if decoder.state().is_terminal() {
            break;
        }
    }
    decoder.finish();

    DecodeReport {
        fragments,
        desyncs: decoder.desync_count(),
        state: decoder.state(),
    }
}

pub fn decode_file(
    path: &Path,
    chunk_size: Option<usize>,
    options: DecoderOptions,
) -> anyhow::Result<DecodeReport> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read captured stream {}", path.display()))?;
    tracing::debug!("Decoding {} bytes from {}", bytes.len(), path.display());
    Ok(decode_bytes(&bytes, chunk_size, options))
}
