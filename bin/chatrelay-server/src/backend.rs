//! Client for the chat backend's own routes.
//!
//! Each call returns the raw [`reqwest::Response`] once the backend has
//! answered with a success status; [`relay`] turns it into an axum response
//! without interpreting the body.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatrelay_types::{BackendEditRequest, ChatMessage, MessageId};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
}

impl Backend {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /messages`
    pub async fn list_messages(&self) -> Result<reqwest::Response, BackendError> {
        self.forward(self.http.get(self.url("/messages"))).await
    }

    /// `GET /messages`, decoded.
    pub async fn fetch_messages(&self) -> Result<Vec<ChatMessage>, BackendError> {
        Ok(self.list_messages().await?.json().await?)
    }

    /// `POST /send` with the caller's body unchanged.
    pub async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, BackendError> {
        self.forward(self.http.post(self.url("/send")).json(body)).await
    }

    /// `DELETE /delete/{id}`
    pub async fn delete(&self, id: MessageId) -> Result<reqwest::Response, BackendError> {
        self.forward(self.http.delete(self.url(&format!("/delete/{id}")))).await
    }

    /// `PUT /edit/{id}`
    pub async fn edit(
        &self,
        id: MessageId,
        body: &BackendEditRequest,
    ) -> Result<reqwest::Response, BackendError> {
        self.forward(self.http.put(self.url(&format!("/edit/{id}"))).json(body)).await
    }

    async fn forward(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let resp = req.send().await?;
        let status = resp.status();
        debug!(status = status.as_u16(), url = %resp.url(), "backend answered");
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(resp)
    }
}

/// Relay a successful backend response to the caller.
///
/// Event streams are passed through chunk-by-chunk with their content type;
/// anything else is parsed as JSON and re-emitted.
pub async fn relay(resp: reqwest::Response) -> Result<Response, BackendError> {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();

    if content_type.starts_with("text/event-stream") {
        let mut response = Body::from_stream(resp.bytes_stream()).into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        return Ok(response);
    }

    let value: serde_json::Value = resp.json().await?;
    Ok(Json(value).into_response())
}
