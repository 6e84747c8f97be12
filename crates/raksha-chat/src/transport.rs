//! Transport abstraction for opening reply streams

use async_trait::async_trait;
use raksha_stream::{Assistant, ChatRequest, EdgeFunctionClient, FragmentStream, Result};

/// Opens the streamed reply for one chat request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the reply's fragment stream
    async fn open(&self, request: &ChatRequest) -> Result<FragmentStream>;
}

/// Edge-function transport - posts to an assistant's function over HTTP
pub struct EdgeTransport {
    client: EdgeFunctionClient,
    assistant: Assistant,
}

impl EdgeTransport {
    pub fn new(client: EdgeFunctionClient, assistant: Assistant) -> Self {
        Self { client, assistant }
    }
}

#[async_trait]
impl Transport for EdgeTransport {
    async fn open(&self, request: &ChatRequest) -> Result<FragmentStream> {
        self.client.stream(self.assistant, request).await
    }
}
