//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are converted to a
//! `{"error": "..."}` JSON body with an appropriate status code.
//!
//! Backend failures are logged with full detail; the caller only sees a
//! fixed message naming the operation that failed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatrelay_types::{ErrorBody, ValidationError};
use thiserror::Error;
use tracing::{error, warn};

use crate::backend::BackendError;

/// The relayed operation, used to word the client-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    List,
    Send,
    Delete,
    Edit,
}

impl RelayAction {
    pub fn client_message(self) -> &'static str {
        match self {
            RelayAction::List => "Failed to fetch messages from the backend.",
            RelayAction::Send => "Failed to send message to the backend.",
            RelayAction::Delete => "Failed to delete message from the backend.",
            RelayAction::Edit => "Failed to edit message in the backend.",
        }
    }

    /// Adapter for `map_err`.
    pub fn failed(self) -> impl FnOnce(BackendError) -> ServerError {
        move |source| ServerError::Backend { action: self, source }
    }
}

/// All errors that can occur in the chatrelay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request was rejected before contacting the backend.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The caller sent a body that could not be read. Answered with the
    /// same message as a failed relay of `action`, but status 400.
    #[error("{action:?} rejected: {detail}")]
    BadRequest { action: RelayAction, detail: String },

    /// The backend could not be reached or answered with a non-2xx status.
    #[error("{action:?} failed: {source}")]
    Backend {
        action: RelayAction,
        #[source]
        source: BackendError,
    },

    /// Rendering the widget failed.
    #[error("render error: {0}")]
    Render(#[from] chatrelay_core::ChatError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ServerError::BadRequest { action, detail } => {
                warn!(?action, %detail, "unreadable request body");
                (StatusCode::BAD_REQUEST, action.client_message().to_owned())
            }

            ServerError::Backend { action, source } => {
                error!(?action, error = %source, "backend relay failed");
                (StatusCode::INTERNAL_SERVER_ERROR, action.client_message().to_owned())
            }
            ServerError::Render(e) => {
                error!(error = %e, "widget render failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(ErrorBody { error: client_message })).into_response()
    }
}
