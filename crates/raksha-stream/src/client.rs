//! Client for the assistant edge functions

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    decoder::DecoderOptions,
    error::{Error, Result},
    stream::{ByteStream, FragmentStream, decode_with},
    types::ChatRequest,
};

/// The chat assistants exposed as edge functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Assistant {
    /// Emergency first-aid guidance
    #[default]
    FirstAid,
    /// General health assistant
    Raksha,
}

impl Assistant {
    /// Get a human-readable name for this assistant
    pub fn name(&self) -> &'static str {
        match self {
            Assistant::FirstAid => "First Aid",
            Assistant::Raksha => "Raksha",
        }
    }

    /// Edge function serving this assistant
    pub fn function_name(&self) -> &'static str {
        match self {
            Assistant::FirstAid => "first-aid-chat",
            Assistant::Raksha => "raksha-chat",
        }
    }
}

impl fmt::Display for Assistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Assistant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "first-aid" | "firstaid" | "first_aid" => Ok(Assistant::FirstAid),
            "raksha" => Ok(Assistant::Raksha),
            other => Err(Error::InvalidConfig(format!("unknown assistant: {other}"))),
        }
    }
}

/// Error body returned by the edge functions on non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Edge function API client
pub struct EdgeFunctionClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    options: DecoderOptions,
}

impl EdgeFunctionClient {
    /// Create a client for the functions base URL (e.g. `https://<project>.supabase.co/functions/v1`)
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            options: DecoderOptions::default(),
        }
    }

    /// Limit how long establishing the connection may take.
    ///
    /// Only the connect phase is bounded; a reply may stream for as long as the server keeps it open.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Ok(self)
    }

    pub fn with_decoder_options(mut self, options: DecoderOptions) -> Self {
        self.options = options;
        self
    }

    /// Full URL of an assistant's edge function
    pub fn url_for(&self, assistant: Assistant) -> String {
        format!("{}/{}", self.base_url, assistant.function_name())
    }

    /// Send a chat request and return the raw streamed body.
    ///
    /// Non-success statuses are turned into [`Error::Request`] using the
    /// `{ "error": ... }` body; an empty success response is [`Error::MissingBody`].
    pub async fn open(&self, assistant: Assistant, request: &ChatRequest) -> Result<ByteStream> {
        if self.base_url.is_empty() {
            return Err(Error::InvalidConfig("functions base URL is empty".into()));
        }

        let url = self.url_for(assistant);
        tracing::debug!(
            "POST {} ({} messages in history)",
            url,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(status, &text);
            tracing::warn!("{} request failed with {}: {}", assistant, status, message);
            return Err(Error::request(status.as_u16(), message));
        }

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(Error::MissingBody);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Decode(e.to_string())));
        Ok(Box::pin(body))
    }

    /// Send a chat request and decode the reply as it streams
    pub async fn stream(
        &self,
        assistant: Assistant,
        request: &ChatRequest,
    ) -> Result<FragmentStream> {
        let body = self.open(assistant, request).await?;
        Ok(decode_with(body, self.options))
    }
}

/// Pick the user-facing message out of an error response body
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}
