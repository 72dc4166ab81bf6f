//! Chat message model.
//!
//! A [`ChatMessage`] is either plain text, which grows while a bot reply is
//! streamed and can be replaced by an edit, or a structured payload (for
//! example a report widget) that never changes after creation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Creation-ordered message identifier (milliseconds since the Unix epoch,
/// bumped on collision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Parse an id that the caller is required to supply.
    ///
    /// `None` and blank strings are [`ValidationError::MissingId`]; anything
    /// that is not an unsigned integer is [`ValidationError::InvalidId`].
    pub fn parse_required(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw.map(str::trim) {
            None | Some("") => Err(ValidationError::MissingId),
            Some(s) => s.parse(),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(MessageId)
            .map_err(|_| ValidationError::InvalidId(s.to_owned()))
    }
}

/// Hands out unique [`MessageId`]s for one session.
///
/// Ids are the current wall-clock time in milliseconds; two ids requested in
/// the same millisecond (or after the clock steps backwards) get `last + 1`.
/// Once `u64::MAX` has been used, ids are taken from the highest free values
/// below it instead, so they stay unique but stop increasing.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last: u64,
    taken: BTreeSet<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id based on the current time.
    pub fn next_id(&mut self) -> MessageId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.next_at(now)
    }

    /// Next id for an explicit clock reading.
    pub fn next_at(&mut self, now_millis: u64) -> MessageId {
        let id = match self.last.checked_add(1) {
            Some(next) => {
                let id = now_millis.max(next);
                self.last = id;
                id
            }
            None => self.highest_free(),
        };
        self.taken.insert(id);
        MessageId(id)
    }

    /// Make sure ids handed out later differ from `id`, e.g. after loading
    /// history from the backend.
    pub fn observe(&mut self, id: MessageId) {
        self.last = self.last.max(id.0);
        self.taken.insert(id.0);
    }

    fn highest_free(&self) -> u64 {
        // `taken` is finite, so a free value exists well before zero.
        let mut candidate = u64::MAX;
        for &used in self.taken.iter().rev() {
            if used != candidate {
                break;
            }
            candidate -= 1;
        }
        candidate
    }
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text; mutable while streaming or editing.
    Text(String),
    /// Pre-rendered structured payload; immutable.
    Structured(serde_json::Value),
}

/// One entry of the chat transcript.
///
/// Serialises to the backend's `{id, sender, content}` shape; `timestamp` is
/// local bookkeeping and defaults to the time of deserialisation when the
/// backend omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub content: MessageContent,
    #[serde(default = "Utc::now", skip_serializing)]
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(id: MessageId, sender: Sender, content: MessageContent) -> Self {
        Self { id, sender, content, timestamp: Utc::now() }
    }

    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Sender::User, MessageContent::Text(text.into()))
    }

    pub fn bot(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Sender::Bot, MessageContent::Text(text.into()))
    }

    /// Creation time. Never changes after construction.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }

    /// Text content, or `None` for structured messages.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            MessageContent::Structured(_) => None,
        }
    }

    /// Append to text content. Returns `false` (and changes nothing) for
    /// structured messages.
    pub fn append_text(&mut self, delta: &str) -> bool {
        match &mut self.content {
            MessageContent::Text(t) => {
                t.push_str(delta);
                true
            }
            MessageContent::Structured(_) => false,
        }
    }

    /// Replace text content, returning the previous text. Structured
    /// messages are left untouched and yield `None`.
    pub fn replace_text(&mut self, text: impl Into<String>) -> Option<String> {
        match &mut self.content {
            MessageContent::Text(t) => Some(std::mem::replace(t, text.into())),
            MessageContent::Structured(_) => None,
        }
    }
}
