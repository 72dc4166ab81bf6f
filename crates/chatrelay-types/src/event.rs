use crate::message::MessageId;

/// One application-level event decoded from a streaming response body.
///
/// Events are transient: they are folded into a conversation as they arrive
/// and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of bot reply text.
    ContentDelta { text: String },
    /// The backend removed a message.
    Deleted { id: MessageId },
    /// End-of-stream sentinel.
    Done,
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamEvent::ContentDelta { text: text.into() }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}
