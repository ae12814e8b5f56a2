//! Upload record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::MediaHandle;

/// Prefix of ids that were never shown to the server.
pub const PLACEHOLDER_PREFIX: &str = "local:";

/// Prefix of client-generated temporary ids.
pub const TEMPORARY_PREFIX: &str = "tmp-";

/// Identifier of a tracked upload.
///
/// Starts out as a client-generated temporary id and is replaced by the
/// server-assigned id once the Upload Service accepts the media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new temporary client id.
    pub fn temporary() -> Self {
        Self(format!("{}{}", TEMPORARY_PREFIX, Uuid::new_v4()))
    }

    /// Generate a placeholder id that the reconciliation loop never polls.
    pub fn placeholder() -> Self {
        Self(format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4()))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the Status Service can be asked about this id.
    pub fn is_server_resolvable(&self) -> bool {
        let id = self.0.trim();
        !id.is_empty() && !id.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UploadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UploadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Upload lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Media is being sent to the Upload Service
    #[default]
    Uploading,
    /// Server accepted the media and is processing it
    Processing,
    /// Server confirmed completion
    Completed,
    /// Upload or processing failed (may be retried)
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    /// Terminal states receive no further updates unless retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }

    /// States the reconciliation loop polls for.
    pub fn is_pending(&self) -> bool {
        matches!(self, UploadStatus::Uploading | UploadStatus::Processing)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptive metadata sent along with the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Video title
    pub title: String,

    /// Media type (e.g. "video/mp4")
    pub media_type: String,

    /// Duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl UploadMetadata {
    pub fn new(title: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            media_type: media_type.into(),
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

/// How a failed upload can be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The local copy is still held and can be resubmitted
    ResubmitLocal,
    /// Only the server copy remains; ask the server to retry or re-upload
    ServerRetry,
}

/// One tracked upload/processing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Current id (temporary or server-assigned)
    pub id: UploadId,

    /// Local media, never persisted
    #[serde(skip)]
    pub media: Option<MediaHandle>,

    /// Server URL once processing completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: UploadStatus,

    /// Upload progress (0-100), meaningful while uploading
    #[serde(default)]
    pub progress: u8,

    /// Failure reason, only while failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Opaque job-posting reference, immutable once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_job_id: Option<String>,

    /// Title, type and duration of the media
    pub metadata: UploadMetadata,

    /// Number of submissions made
    #[serde(default)]
    pub attempts: u32,

    /// Registration timestamp
    pub submitted_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Sequence number of the last applied update
    #[serde(skip)]
    pub revision: u64,
}

impl UploadRecord {
    /// Create a fresh record in the `uploading` state.
    pub fn new(
        id: UploadId,
        media: Option<MediaHandle>,
        metadata: UploadMetadata,
        related_job_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            media,
            canonical_url: None,
            status: UploadStatus::Uploading,
            progress: 0,
            error: None,
            related_job_id,
            metadata,
            attempts: 0,
            submitted_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a local media handle is still owned by this record.
    pub fn has_local_media(&self) -> bool {
        self.media.is_some()
    }

    /// Recovery path for a failed record, `None` when not failed.
    pub fn recovery(&self) -> Option<Recovery> {
        if self.status != UploadStatus::Failed {
            return None;
        }
        if self.has_local_media() {
            Some(Recovery::ResubmitLocal)
        } else {
            Some(Recovery::ServerRetry)
        }
    }
}
