//! Error taxonomy for the client core.

use chatrelay_types::ValidationError;
use thiserror::Error;

/// A single protocol line could not be decoded. Recovered locally: the line
/// is skipped and decoding continues.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("data line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("data line is not valid JSON ({payload:?}): {source}")]
    InvalidJson {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`deleted` field is not a message id: {0}")]
    InvalidDeletedId(serde_json::Value),
}

/// The connection failed, the relay answered with a non-success status, or
/// the body broke off mid-stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("relay returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response stream failed: {0}")]
    Stream(String),
}

/// Errors surfaced by [`crate::ChatSession`] and the renderer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("template error: {0}")]
    Render(#[from] minijinja::Error),
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Transport(TransportError::Request(e))
    }
}
