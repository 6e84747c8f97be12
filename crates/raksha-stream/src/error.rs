//! Error types for raksha-stream

use thiserror::Error;

/// Result type alias using raksha-stream Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or decoding a chat stream
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The edge function answered with a non-success status
    #[error("Request failed ({status}): {message}")]
    Request { status: u16, message: String },

    /// The response carried no body to decode
    #[error("Response has no body")]
    MissingBody,

    /// Reading the body failed mid-stream
    #[error("Stream decode failed: {0}")]
    Decode(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a request error from a status code and message
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }
}
