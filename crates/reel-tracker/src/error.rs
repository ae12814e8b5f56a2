//! Tracker error types.

use thiserror::Error;

use reel_client::ClientError;

pub type TrackerResult<T> = Result<T, TrackerError>;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown upload: {0}")]
    UnknownUpload(String),

    #[error("Upload service error: {0}")]
    Upload(#[from] ClientError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unknown(id: impl std::fmt::Display) -> Self {
        Self::UnknownUpload(id.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
