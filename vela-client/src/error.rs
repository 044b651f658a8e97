//! Error classification for API calls
//!
//! Every failure from the HTTP adapter lands in one of these kinds.
//! Transport, rate-limit and server errors are the only retryable ones;
//! everything else surfaces exactly once.

use serde_json::Value as Json;

/// Classified API error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// DNS, TCP or TLS failure before a status code existed
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed (HTTP {status})")]
    Auth { status: u16, body: Json },

    #[error("not found (HTTP 404)")]
    NotFound { body: Json },

    #[error("conflict (HTTP {status})")]
    Conflict { status: u16, body: Json },

    #[error("rate limited (HTTP 429)")]
    RateLimited {
        retry_after: Option<u64>,
        body: Json,
    },

    #[error("server error (HTTP {status})")]
    Server { status: u16, body: Json },

    #[error("request rejected (HTTP {status})")]
    Validation { status: u16, body: Json },

    #[error("no ETag captured on the precursor read")]
    EtagMissing,

    #[error("invocation deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid request URL: {0}")]
    Url(String),
}

impl ApiError {
    /// Whether the adapter may retry this failure (idempotent verbs only)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::RateLimited { .. } | ApiError::Server { .. }
        )
    }

    /// Stable kind string for the result map's `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "TransportError",
            ApiError::Auth { .. } => "AuthError",
            ApiError::NotFound { .. } => "NotFound",
            ApiError::Conflict { .. } => "Conflict",
            ApiError::RateLimited { .. } => "RateLimited",
            ApiError::Server { .. } => "ServerError",
            ApiError::Validation { .. } => "ValidationError",
            ApiError::EtagMissing => "EtagMissing",
            ApiError::DeadlineExceeded => "Timeout",
            ApiError::Url(_) => "TransportError",
        }
    }

    /// The server payload attached to this error, if any
    pub fn body(&self) -> Option<&Json> {
        match self {
            ApiError::Auth { body, .. }
            | ApiError::NotFound { body }
            | ApiError::Conflict { body, .. }
            | ApiError::RateLimited { body, .. }
            | ApiError::Server { body, .. }
            | ApiError::Validation { body, .. } => Some(body),
            _ => None,
        }
    }
}
