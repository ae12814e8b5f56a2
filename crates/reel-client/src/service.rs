//! Service boundary traits.
//!
//! The tracker only talks to these traits; `ReelApiClient` is the HTTP
//! implementation and tests plug in in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use reel_models::{RemoteStatus, UploadRecord};

use crate::error::ClientResult;

/// Metadata sent along with an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitMetadata {
    pub title: String,
    pub media_type: String,
    pub duration_secs: Option<f64>,
    pub related_job_id: Option<String>,
}

impl SubmitMetadata {
    pub fn from_record(record: &UploadRecord) -> Self {
        Self {
            title: record.metadata.title.clone(),
            media_type: record.metadata.media_type.clone(),
            duration_secs: record.metadata.duration_secs,
            related_job_id: record.related_job_id.clone(),
        }
    }

    /// File name for the multipart part, derived from the media type.
    pub fn file_name(&self) -> String {
        let ext = self
            .media_type
            .split('/')
            .nth(1)
            .and_then(|sub| sub.split(';').next())
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin");
        format!("upload.{}", ext)
    }
}

/// Server acknowledgement of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    #[serde(rename = "id", alias = "videoId", alias = "serverId")]
    pub server_id: String,
}

/// Accepts media and assigns a server id.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn submit(&self, media: Bytes, metadata: &SubmitMetadata) -> ClientResult<SubmitReceipt>;
}

/// Reports the processing state of an accepted upload.
#[async_trait]
pub trait StatusService: Send + Sync {
    async fn get_status(&self, server_id: &str) -> ClientResult<RemoteStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{MediaHandle, UploadId, UploadMetadata};

    #[test]
    fn test_file_name_from_media_type() {
        let mut meta = SubmitMetadata {
            title: "Intro".into(),
            media_type: "video/webm; codecs=vp9".into(),
            duration_secs: None,
            related_job_id: None,
        };
        assert_eq!(meta.file_name(), "upload.webm");

        meta.media_type = "application".into();
        assert_eq!(meta.file_name(), "upload.bin");
    }

    #[test]
    fn test_from_record_carries_job() {
        let record = UploadRecord::new(
            UploadId::from("tmp1"),
            Some(MediaHandle::new()),
            UploadMetadata::new("Intro", "video/mp4").with_duration(3.0),
            Some("job9".into()),
        );
        let meta = SubmitMetadata::from_record(&record);
        assert_eq!(meta.related_job_id.as_deref(), Some("job9"));
        assert_eq!(meta.duration_secs, Some(3.0));
    }

    #[test]
    fn test_receipt_aliases() {
        let receipt: SubmitReceipt = serde_json::from_str(r#"{"videoId":"srv3"}"#).unwrap();
        assert_eq!(receipt.server_id, "srv3");
    }
}
