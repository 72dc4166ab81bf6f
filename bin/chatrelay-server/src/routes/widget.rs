//! Server-rendered chat widget.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chatrelay_core::{render_widget, ChatContext, WidgetOptions};
use serde::Deserialize;

use crate::error::{RelayAction, ServerError};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/widget", get(get_widget))
}

#[derive(Debug, Default, Deserialize)]
pub struct WidgetQuery {
    pub context: Option<String>,
    #[serde(default)]
    pub full_screen: bool,
}

/// `GET /widget?context=Campaign&full_screen=true`
///
/// Fetches the transcript from the backend and renders it with the palette
/// of the requested context.
pub async fn get_widget(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WidgetQuery>,
) -> Result<Html<String>, ServerError> {
    let context = query
        .context
        .as_deref()
        .map(ChatContext::from_name)
        .unwrap_or_default();
    let messages = state
        .backend
        .fetch_messages()
        .await
        .map_err(RelayAction::List.failed())?;

    let options = WidgetOptions { context, full_screen: query.full_screen, ..Default::default() };
    let html = render_widget(&messages, &context.palette(), &options)?;
    Ok(Html(html))
}
