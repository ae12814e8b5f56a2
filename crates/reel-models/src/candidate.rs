//! Registration input for a new local upload.

use serde::{Deserialize, Serialize};

use crate::{MediaHandle, UploadId, UploadMetadata, UploadRecord};

/// Maximum id length accepted at registration.
pub const MAX_ID_LEN: usize = 128;

/// Maximum title length accepted at registration.
pub const MAX_TITLE_LEN: usize = 200;

/// A local media reference plus metadata, ready to be tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCandidate {
    pub id: UploadId,
    pub media: MediaHandle,
    pub metadata: UploadMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_job_id: Option<String>,
}

impl UploadCandidate {
    /// Create a candidate with a fresh temporary id.
    pub fn new(media: MediaHandle, metadata: UploadMetadata) -> Self {
        Self {
            id: UploadId::temporary(),
            media,
            metadata,
            related_job_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<UploadId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn for_job(mut self, job_id: impl Into<String>) -> Self {
        self.related_job_id = Some(job_id.into());
        self
    }

    /// Validate the candidate.
    pub fn validate(&self) -> Result<(), String> {
        let id = self.id.as_str();
        if id.trim().is_empty() {
            return Err("Upload id cannot be empty".to_string());
        }
        if id.len() > MAX_ID_LEN {
            return Err(format!("Upload id exceeds {} characters", MAX_ID_LEN));
        }

        let title = self.metadata.title.trim();
        if title.is_empty() {
            return Err("Title cannot be empty".to_string());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("Title exceeds {} characters", MAX_TITLE_LEN));
        }

        if self.metadata.media_type.trim().is_empty() {
            return Err("Media type cannot be empty".to_string());
        }

        if let Some(duration) = self.metadata.duration_secs {
            if !duration.is_finite() || duration < 0.0 {
                return Err(format!("Invalid duration: {}", duration));
            }
        }

        if matches!(&self.related_job_id, Some(job) if job.trim().is_empty()) {
            return Err("Related job id cannot be blank".to_string());
        }

        Ok(())
    }

    /// Build the initial record for this candidate.
    pub fn into_record(self) -> UploadRecord {
        UploadRecord::new(self.id, Some(self.media), self.metadata, self.related_job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadStatus;

    fn candidate() -> UploadCandidate {
        UploadCandidate::new(
            MediaHandle::new(),
            UploadMetadata::new("Pitch video", "video/webm").with_duration(12.5),
        )
    }

    #[test]
    fn test_valid_candidate() {
        assert!(candidate().validate().is_ok());
        assert!(candidate().id.as_str().starts_with("tmp-"));
    }

    #[test]
    fn test_rejects_blank_fields() {
        assert!(candidate().with_id("").validate().is_err());

        let mut c = candidate();
        c.metadata.title = "   ".into();
        assert!(c.validate().is_err());

        let mut c = candidate();
        c.metadata.media_type = String::new();
        assert!(c.validate().is_err());

        assert!(candidate().for_job(" ").validate().is_err());
    }

    #[test]
    fn test_rejects_bad_duration_and_long_title() {
        let mut c = candidate();
        c.metadata.duration_secs = Some(-1.0);
        assert!(c.validate().is_err());

        c.metadata.duration_secs = Some(f64::NAN);
        assert!(c.validate().is_err());

        let mut c = candidate();
        c.metadata.title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_into_record() {
        let c = candidate().with_id("tmp1").for_job("job9");
        let media = c.media.clone();
        let rec = c.into_record();

        assert_eq!(rec.id.as_str(), "tmp1");
        assert_eq!(rec.status, UploadStatus::Uploading);
        assert_eq!(rec.progress, 0);
        assert_eq!(rec.media, Some(media));
        assert_eq!(rec.related_job_id.as_deref(), Some("job9"));
    }
}
