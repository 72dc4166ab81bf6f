//! Shared types for chatrelay.
//!
//! Everything that crosses a crate boundary lives here: message ids and chat
//! messages, the decoded stream events, the JSON bodies exchanged with the
//! relay and the backend, and the context-keyed colour palettes.

pub mod error;
pub mod event;
pub mod message;
pub mod palette;
pub mod wire;

pub use error::ValidationError;
pub use event::StreamEvent;
pub use message::{ChatMessage, IdGenerator, MessageContent, MessageId, Sender};
pub use palette::{ChatContext, Palette};
pub use wire::{BackendEditRequest, EditRequest, ErrorBody};
