//! chatrelay-core – client-side chat engine.
//!
//! - [`decoder`] turns a chunked `data: <json>` response body into
//!   [`StreamEvent`]s.
//! - [`conversation`] folds those events into an ordered transcript and
//!   tracks optimistic local mutations until the backend confirms them.
//! - [`client`] talks to the relay over HTTP and drives a [`Conversation`]
//!   end-to-end.
//! - [`render`] produces the chat widget markup from a transcript and an
//!   explicit [`Palette`].

pub mod client;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod render;

pub use chatrelay_types::{
    ChatContext, ChatMessage, MessageContent, MessageId, Palette, Sender, StreamEvent,
    ValidationError,
};
pub use client::{ChatClient, ChatSession, ResponseStream};
pub use conversation::{fold, Conversation, OpKind, OpState, OpTicket, PendingOp, StreamPhase};
pub use decoder::{decode_stream, parse_line, StreamDecoder, DONE_SENTINEL};
pub use error::{ChatError, DecodeError, TransportError};
pub use render::{render_widget, WidgetOptions};
