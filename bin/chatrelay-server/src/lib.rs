//! chatrelay-server – HTTP relay in front of the chat backend.
//!
//! Every `/api/chat` route forwards the caller's request to the backend
//! unchanged and relays the answer: event streams chunk-by-chunk, JSON bodies
//! as JSON. Backend failures of any kind become a 500 with a uniform
//! `{"error": "..."}` body.

pub mod backend;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
