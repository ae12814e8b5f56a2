//! Client error types.

use thiserror::Error;

/// Result type for service calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by the Upload and Status Services.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Upload not found: {0}")]
    NotFound(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an HTTP status code to an error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            404 | 410 => Self::NotFound(msg),
            408 => Self::Timeout(msg),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, msg),
            _ => Self::RequestFailed(msg),
        }
    }

    /// Whether the same request may succeed later without changes.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::RateLimited(_) | ClientError::ServerError(..) | ClientError::Timeout(_) => {
                true
            }
            ClientError::Network(e) => !e.is_builder() && !e.is_decode(),
            _ => false,
        }
    }

    /// The server no longer knows the upload.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Delay requested by the server, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ClientError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }
}
