//! Conversation state: the ordered transcript, the phase of the active
//! stream, and optimistic mutations awaiting confirmation.
//!
//! The transcript is only ever changed through [`Conversation::apply`] (the
//! fold of decoded [`StreamEvent`]s) and the `optimistic_*` / `confirm` /
//! `fail` operations.
//!
//! If a message is edited while it is still receiving deltas, the edit wins:
//! the message is detached from the stream and later deltas start a new bot
//! message.

use chatrelay_types::{ChatMessage, IdGenerator, MessageId, StreamEvent, ValidationError};
use tracing::debug;

// ── Stream phase ──────────────────────────────────────────────────────────────

/// Lifecycle of one streaming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming,
    Done,
    Aborted,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Done | StreamPhase::Aborted)
    }

    fn after(self, event: &StreamEvent) -> StreamPhase {
        match (self, event) {
            (phase, _) if phase.is_terminal() => phase,
            (_, StreamEvent::Done) => StreamPhase::Done,
            _ => StreamPhase::Streaming,
        }
    }
}

// ── Optimistic operations ─────────────────────────────────────────────────────

/// Handle for an optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Pending,
    Confirmed,
    Failed,
}

/// What was changed locally, with enough information to undo it.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Send { id: MessageId },
    Edit { id: MessageId, previous: String },
    Delete { id: MessageId, removed: Option<(usize, ChatMessage)> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    pub ticket: OpTicket,
    pub kind: OpKind,
    pub state: OpState,
}

// ── Conversation ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    ids: IdGenerator,
    phase: StreamPhase,
    /// Bot message currently receiving deltas.
    streaming: Option<MessageId>,
    ops: Vec<PendingOp>,
    next_ticket: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing transcript, e.g. the backend's history.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        let mut conv = Self::new();
        conv.load(messages);
        conv
    }

    /// Replace the transcript wholesale. Resets the stream phase and drops
    /// pending operations.
    pub fn load(&mut self, messages: Vec<ChatMessage>) {
        for m in &messages {
            self.ids.observe(m.id);
        }
        self.messages = messages;
        self.phase = StreamPhase::Idle;
        self.streaming = None;
        self.ops.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Id of the bot message currently receiving deltas, if any.
    pub fn streaming_id(&self) -> Option<MessageId> {
        self.streaming
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Operations that have been applied locally but not yet resolved.
    pub fn pending_ops(&self) -> &[PendingOp] {
        &self.ops
    }

    // ── Fold ─────────────────────────────────────────────────────────────────

    /// Prepare for a new response stream.
    pub fn begin_stream(&mut self) {
        self.phase = StreamPhase::Idle;
        self.streaming = None;
    }

    /// Mark the active stream as aborted. No-op once the stream is terminal.
    pub fn abort(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = StreamPhase::Aborted;
            self.streaming = None;
        }
    }

    /// Fold one event into the transcript. Returns `false` when the event was
    /// ignored because the stream had already finished.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        if self.phase.is_terminal() {
            debug!(?event, phase = ?self.phase, "ignoring event after end of stream");
            return false;
        }
        self.phase = self.phase.after(event);

        match event {
            StreamEvent::ContentDelta { text } => self.append_delta(text),
            StreamEvent::Deleted { id } => {
                self.remove(*id);
            }
            StreamEvent::Done => self.streaming = None,
        }
        true
    }

    fn append_delta(&mut self, text: &str) {
        if let (Some(id), Some(last)) = (self.streaming, self.messages.last_mut()) {
            if last.id == id && last.is_bot() && last.append_text(text) {
                return;
            }
        }
        let id = self.ids.next_id();
        self.messages.push(ChatMessage::bot(id, text));
        self.streaming = Some(id);
    }

    fn remove(&mut self, id: MessageId) -> Option<(usize, ChatMessage)> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        if self.streaming == Some(id) {
            self.streaming = None;
        }
        Some((index, self.messages.remove(index)))
    }

    // ── Optimistic operations ────────────────────────────────────────────────

    /// Append a user message before the backend has accepted it.
    pub fn optimistic_send(
        &mut self,
        text: &str,
    ) -> Result<(OpTicket, ChatMessage), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let message = ChatMessage::user(self.ids.next_id(), text);
        self.messages.push(message.clone());
        let ticket = self.record(OpKind::Send { id: message.id });
        Ok((ticket, message))
    }

    /// Replace a message's text before the backend has accepted the edit.
    pub fn optimistic_edit(
        &mut self,
        id: MessageId,
        text: &str,
    ) -> Result<OpTicket, ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(ValidationError::UnknownMessage(id))?;
        let previous = message.replace_text(text).ok_or(ValidationError::NotEditable(id))?;

        if self.streaming == Some(id) {
            debug!(%id, "edit detaches message from the active stream");
            self.streaming = None;
        }
        Ok(self.record(OpKind::Edit { id, previous }))
    }

    /// Remove a message before the backend has accepted the deletion. Ids
    /// that are not in the local transcript are still forwarded.
    pub fn optimistic_delete(&mut self, id: MessageId) -> OpTicket {
        let removed = self.remove(id);
        self.record(OpKind::Delete { id, removed })
    }

    /// The backend accepted the operation.
    pub fn confirm(&mut self, ticket: OpTicket) -> Option<PendingOp> {
        let mut op = self.take_op(ticket)?;
        op.state = OpState::Confirmed;
        Some(op)
    }

    /// The backend rejected the operation (or could not be reached); undo
    /// the local mutation.
    pub fn fail(&mut self, ticket: OpTicket) -> Option<PendingOp> {
        let mut op = self.take_op(ticket)?;
        match &op.kind {
            OpKind::Send { id } => {
                self.remove(*id);
            }
            OpKind::Edit { id, previous } => {
                if let Some(m) = self.messages.iter_mut().find(|m| m.id == *id) {
                    m.replace_text(previous.clone());
                }
            }
            OpKind::Delete { id, removed: Some((index, message)) } => {
                if self.get(*id).is_none() {
                    let index = (*index).min(self.messages.len());
                    self.messages.insert(index, message.clone());
                }
            }
            OpKind::Delete { removed: None, .. } => {}
        }
        op.state = OpState::Failed;
        Some(op)
    }

    fn record(&mut self, kind: OpKind) -> OpTicket {
        self.next_ticket += 1;
        let ticket = OpTicket(self.next_ticket);
        self.ops.push(PendingOp { ticket, kind, state: OpState::Pending });
        ticket
    }

    fn take_op(&mut self, ticket: OpTicket) -> Option<PendingOp> {
        let index = self.ops.iter().position(|op| op.ticket == ticket)?;
        Some(self.ops.remove(index))
    }
}

/// Fold a sequence of events into a conversation.
pub fn fold(
    mut conversation: Conversation,
    events: impl IntoIterator<Item = StreamEvent>,
) -> Conversation {
    for event in events {
        conversation.apply(&event);
    }
    conversation
}

// ── Tests ──────────────────────────────────────────────────────────────────────
