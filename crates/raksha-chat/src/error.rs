//! Error types for raksha-chat

use thiserror::Error;

/// Result type alias using raksha-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during chat operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the stream layer
    #[error(transparent)]
    Stream(#[from] raksha_stream::Error),

    /// Nothing to send
    #[error("Message is empty")]
    EmptyMessage,

    /// An assistant reply is still streaming
    #[error("A reply is already in progress")]
    Busy,
}

/// Text shown to the user when a turn fails
pub fn notification_for(error: &raksha_stream::Error) -> String {
    use raksha_stream::Error as StreamError;

    match error {
        StreamError::Request { message, .. } => message.clone(),
        StreamError::MissingBody => "No response received from the assistant".to_string(),
        StreamError::Http(_) => "Could not reach the assistant. Please try again.".to_string(),
        StreamError::Decode(_) => "The reply was interrupted. Please try again.".to_string(),
        other => other.to_string(),
    }
}
