//! Liveness probe for the relay itself.
//!
//! `GET /health` never calls the backend, so it stays green while the
//! backend is down; callers that need the backend use `GET /api/chat`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(relay_health))
}

#[derive(Debug, Serialize)]
pub struct RelayHealth {
    pub status: &'static str,
    pub version: &'static str,
    /// Backend the relay forwards to (not contacted).
    pub backend: String,
    pub uptime_secs: u64,
}

pub async fn relay_health(State(state): State<Arc<AppState>>) -> Json<RelayHealth> {
    Json(RelayHealth {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.config.backend_url.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────
