use thiserror::Error;

use crate::message::MessageId;

/// A request was rejected before any network call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No message id was supplied where one is required.
    #[error("Message ID is required.")]
    MissingId,

    /// The supplied id is not a valid message id.
    #[error("invalid message id: {0:?}")]
    InvalidId(String),

    /// Message text was empty after trimming.
    #[error("message content must not be empty")]
    EmptyContent,

    /// The id does not refer to a message in the local transcript.
    #[error("no message with id {0}")]
    UnknownMessage(MessageId),

    /// Structured messages cannot be edited.
    #[error("message {0} has structured content and cannot be edited")]
    NotEditable(MessageId),
}
