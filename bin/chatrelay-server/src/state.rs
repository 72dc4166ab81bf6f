//! Shared application state injected into every Axum handler.

use std::sync::Arc;
use std::time::Instant;

use crate::backend::{Backend, BackendError};
use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Client for the chat backend.
    pub backend: Backend,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, BackendError> {
        let backend = Backend::new(config.backend_url.clone(), config.backend_timeout)?;
        Ok(Self { config: Arc::new(config), backend, started_at: Instant::now() })
    }
}
