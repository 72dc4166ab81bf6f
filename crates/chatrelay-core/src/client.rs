//! HTTP client for the relay's `/api/chat` routes.
//!
//! [`ChatClient`] is a thin wrapper that opens requests and hands back decoded
//! event streams. [`ChatSession`] pairs a client with a [`Conversation`] and
//! runs each operation end-to-end:
//!
//! 1. validate the input (no network call on failure),
//! 2. apply the mutation optimistically,
//! 3. issue the request; a non-success status or connection failure rolls
//!    the mutation back and aborts the stream,
//! 4. fold every decoded event into the conversation until `Done`.

use std::pin::Pin;

use chatrelay_types::{ChatMessage, EditRequest, ErrorBody, MessageId, StreamEvent};
use futures::stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, OpTicket, StreamPhase};
use crate::decoder::decode_stream;
use crate::error::{ChatError, DecodeError, TransportError};

/// Decoded events of one streaming response.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

const CHAT_PATH: &str = "/api/chat";

// ── ChatClient ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Client for the relay at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{CHAT_PATH}", self.base_url)
    }

    fn endpoint_for(&self, id: MessageId) -> String {
        format!("{}{CHAT_PATH}?id={id}", self.base_url)
    }

    /// `GET /api/chat` – the backend's message history.
    pub async fn list_messages(&self) -> Result<Vec<ChatMessage>, ChatError> {
        let resp = self.http.get(self.endpoint()).send().await?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| {
            ChatError::Decode(DecodeError::InvalidJson {
                payload: String::from_utf8_lossy(&body).into_owned(),
                source,
            })
        })
    }

    /// `POST /api/chat` – send a user message; the reply is streamed.
    pub async fn send(&self, message: &ChatMessage) -> Result<ResponseStream, ChatError> {
        self.open_stream(self.http.post(self.endpoint()).json(message)).await
    }

    /// `PUT /api/chat?id=` – replace a message's text; a new reply is streamed.
    pub async fn edit(&self, id: MessageId, content: &str) -> Result<ResponseStream, ChatError> {
        let body = EditRequest { content: content.to_owned() };
        self.open_stream(self.http.put(self.endpoint_for(id)).json(&body)).await
    }

    /// `DELETE /api/chat?id=` – the confirmation arrives as a `deleted` event.
    pub async fn delete(&self, id: MessageId) -> Result<ResponseStream, ChatError> {
        self.open_stream(self.http.delete(self.endpoint_for(id))).await
    }

    async fn open_stream(&self, req: reqwest::RequestBuilder) -> Result<ResponseStream, ChatError> {
        let resp = check_status(req.send().await?).await?;
        debug!(status = resp.status().as_u16(), "response stream opened");
        Ok(decode_stream(resp.bytes_stream()).boxed())
    }
}

/// Turn a non-success response into [`TransportError::Status`], using the
/// relay's `{"error": ...}` body as the message when present.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    Err(TransportError::Status { status: status.as_u16(), message })
}

// ── ChatSession ───────────────────────────────────────────────────────────────

/// A conversation kept in sync with the relay.
#[derive(Debug)]
pub struct ChatSession {
    client: ChatClient,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(client: ChatClient) -> Self {
        Self { client, conversation: Conversation::new() }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    /// Reload the transcript from the backend.
    pub async fn refresh(&mut self) -> Result<(), ChatError> {
        let messages = self.client.list_messages().await?;
        info!(count = messages.len(), "loaded message history");
        self.conversation.load(messages);
        Ok(())
    }

    /// Send `text` as a user message and stream the bot reply.
    ///
    /// `on_delta` sees every content delta as it arrives.
    pub async fn send(
        &mut self,
        text: &str,
        on_delta: impl FnMut(&str),
    ) -> Result<StreamPhase, ChatError> {
        let (ticket, message) = self.conversation.optimistic_send(text)?;
        let opened = self.client.send(&message).await;
        self.drive(ticket, opened, on_delta).await
    }

    /// Edit a message and stream the regenerated reply.
    pub async fn edit(
        &mut self,
        id: Option<MessageId>,
        text: &str,
        on_delta: impl FnMut(&str),
    ) -> Result<StreamPhase, ChatError> {
        let id = id.ok_or(chatrelay_types::ValidationError::MissingId)?;
        let ticket = self.conversation.optimistic_edit(id, text)?;
        let opened = self.client.edit(id, text).await;
        self.drive(ticket, opened, on_delta).await
    }

    /// Delete a message.
    pub async fn delete(&mut self, id: Option<MessageId>) -> Result<StreamPhase, ChatError> {
        let id = id.ok_or(chatrelay_types::ValidationError::MissingId)?;
        let ticket = self.conversation.optimistic_delete(id);
        let opened = self.client.delete(id).await;
        self.drive(ticket, opened, |_| {}).await
    }

    /// Fold a response stream into the conversation.
    ///
    /// The operation is confirmed as soon as the relay answers with a success
    /// status; a later transport failure aborts the stream but keeps whatever
    /// was folded so far. A body that ends without the sentinel also leaves
    /// the stream `Aborted`.
    async fn drive(
        &mut self,
        ticket: OpTicket,
        opened: Result<ResponseStream, ChatError>,
        mut on_delta: impl FnMut(&str),
    ) -> Result<StreamPhase, ChatError> {
        self.conversation.begin_stream();

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "request failed; rolling back");
                self.conversation.abort();
                self.conversation.fail(ticket);
                return Err(e);
            }
        };
        self.conversation.confirm(ticket);

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if let StreamEvent::ContentDelta { text } = &event {
                        on_delta(text);
                    }
                    self.conversation.apply(&event);
                    if event.is_done() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "response stream broke off");
                    self.conversation.abort();
                    return Err(e.into());
                }
            }
        }

        if self.conversation.phase() != StreamPhase::Done {
            warn!("response ended without end-of-stream marker");
            self.conversation.abort();
        }
        Ok(self.conversation.phase())
    }
}
