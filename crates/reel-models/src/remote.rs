//! Status Service response models.

use serde::{Deserialize, Serialize};

/// Processing state reported by the Status Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    #[serde(alias = "queued", alias = "pending", alias = "uploading")]
    Processing,
    #[serde(alias = "ready")]
    Completed,
    #[serde(alias = "error")]
    Failed,
}

/// Current server-side state of one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    #[serde(rename = "status")]
    pub state: RemoteState,

    /// Canonical server id, when the service reports one
    #[serde(
        rename = "id",
        alias = "videoId",
        alias = "serverId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub canonical_id: Option<String>,

    /// Canonical media URL once completed
    #[serde(
        rename = "url",
        alias = "canonicalUrl",
        alias = "videoUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub canonical_url: Option<String>,

    /// Human-readable failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RemoteStatus {
    pub fn processing() -> Self {
        Self {
            state: RemoteState::Processing,
            canonical_id: None,
            canonical_url: None,
            message: None,
        }
    }

    pub fn completed(canonical_id: impl Into<String>, canonical_url: impl Into<String>) -> Self {
        Self {
            state: RemoteState::Completed,
            canonical_id: Some(canonical_id.into()),
            canonical_url: Some(canonical_url.into()),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: RemoteState::Failed,
            canonical_id: None,
            canonical_url: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_with_aliases() {
        let status: RemoteStatus = serde_json::from_str(
            r#"{"status":"completed","videoId":"srv1","videoUrl":"https://cdn/srv1.mp4"}"#,
        )
        .unwrap();
        assert_eq!(status.state, RemoteState::Completed);
        assert_eq!(status.canonical_id.as_deref(), Some("srv1"));
        assert_eq!(status.canonical_url.as_deref(), Some("https://cdn/srv1.mp4"));
    }

    #[test]
    fn test_parse_minimal_processing() {
        let status: RemoteStatus = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(status, RemoteStatus::processing());
    }

    #[test]
    fn test_parse_failed_message() {
        let status: RemoteStatus =
            serde_json::from_str(r#"{"status":"failed","message":"codec unsupported"}"#).unwrap();
        assert_eq!(status.state, RemoteState::Failed);
        assert_eq!(status.message.as_deref(), Some("codec unsupported"));
    }
}
