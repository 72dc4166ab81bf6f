//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Runtime configuration for chatrelay-server.
///
/// Every field has a default so the relay works against a local backend
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the chat backend (default: `"http://localhost:8000"`).
    pub backend_url: String,

    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Connect timeout for backend requests.
    pub backend_timeout: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            backend_url: env_or("FASTAPI_BASE_URL", "http://localhost:8000"),
            bind_address: env_or("CHATRELAY_BIND", "0.0.0.0:3000"),
            log_level: env_or("CHATRELAY_LOG", "info"),
            log_json: std::env::var("CHATRELAY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: std::env::var("CHATRELAY_CORS_ORIGINS").ok(),
            backend_timeout: Duration::from_secs(parse_env("CHATRELAY_BACKEND_TIMEOUT_SECS", 30)),
        }
    }

    /// Configuration pointing at `backend_url` with every other field at its
    /// default.
    pub fn for_backend(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            bind_address: "0.0.0.0:3000".into(),
            log_level: "info".into(),
            log_json: false,
            cors_allowed_origins: None,
            backend_timeout: Duration::from_secs(30),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
