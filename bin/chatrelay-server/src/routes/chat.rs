//! `/api/chat` pass-through routes.
//!
//! | Relay                     | Backend                |
//! |---------------------------|------------------------|
//! | `GET    /api/chat`        | `GET    /messages`     |
//! | `POST   /api/chat`        | `POST   /send`         |
//! | `DELETE /api/chat?id=`    | `DELETE /delete/{id}`  |
//! | `PUT    /api/chat?id=`    | `PUT    /edit/{id}`    |
//!
//! A missing `id` or an unreadable body is rejected with 400 before the
//! backend is contacted.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chatrelay_types::{BackendEditRequest, EditRequest, MessageId};
use serde::Deserialize;
use tracing::{debug, info};

use crate::backend::relay;
use crate::error::{RelayAction, ServerError};
use crate::state::AppState;

/// Register the pass-through routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/chat",
        get(list_messages)
            .post(send_message)
            .delete(delete_message)
            .put(edit_message),
    )
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    fn require(&self) -> Result<MessageId, ServerError> {
        Ok(MessageId::parse_required(self.id.as_deref())?)
    }
}

fn read_body<T>(
    action: RelayAction,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ServerError> {
    body.map(|Json(v)| v).map_err(|rejection| ServerError::BadRequest {
        action,
        detail: rejection.body_text(),
    })
}

/// `GET /api/chat`
pub async fn list_messages(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let resp = state.backend.list_messages().await.map_err(RelayAction::List.failed())?;
    relay(resp).await.map_err(RelayAction::List.failed())
}

/// `POST /api/chat` – body forwarded to the backend unchanged.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Response, ServerError> {
    let body = read_body(RelayAction::Send, body)?;
    debug!(id = %body["id"], "relaying message");
    let resp = state.backend.send(&body).await.map_err(RelayAction::Send.failed())?;
    relay(resp).await.map_err(RelayAction::Send.failed())
}

/// `DELETE /api/chat?id=`
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Response, ServerError> {
    let id = query.require()?;
    info!(%id, "relaying delete");
    let resp = state.backend.delete(id).await.map_err(RelayAction::Delete.failed())?;
    relay(resp).await.map_err(RelayAction::Delete.failed())
}

/// `PUT /api/chat?id=` with `{"content": ...}`; forwarded as
/// `{"updated_content": ...}`.
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    body: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let id = query.require()?;
    let body: BackendEditRequest = read_body(RelayAction::Edit, body)?.into();
    info!(%id, "relaying edit");
    let resp = state.backend.edit(id, &body).await.map_err(RelayAction::Edit.failed())?;
    relay(resp).await.map_err(RelayAction::Edit.failed())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
