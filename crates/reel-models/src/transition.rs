//! Pure state transitions for upload records.
//!
//! The tracker feeds service responses and user actions through these
//! functions; nothing here performs I/O, which keeps the state machine
//! testable without network fakes.

use chrono::Utc;

use crate::{MediaHandle, UploadId, UploadRecord, UploadStatus};

/// Error stored when a record fails without a more specific reason.
pub const DEFAULT_FAILURE: &str = "Upload failed";

/// Partial update of an upload record. Set fields win over stored ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadPatch {
    pub status: Option<UploadStatus>,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub canonical_url: Option<String>,
    /// Only applied when the record has no job reference yet.
    pub related_job_id: Option<String>,
    /// Drop the local media handle; the caller releases it.
    pub release_media: bool,
    /// Count one more submission attempt.
    pub count_attempt: bool,
    /// Sequence number issued when the originating request was issued.
    pub seq: Option<u64>,
}

impl UploadPatch {
    pub fn status(status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn processing() -> Self {
        Self::status(UploadStatus::Processing)
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(UploadStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Completion as confirmed by the server. A canonical URL makes the
    /// local copy redundant, so the handle is dropped along with it.
    pub fn completed(canonical_url: Option<String>) -> Self {
        let release_media = canonical_url.is_some();
        Self {
            status: Some(UploadStatus::Completed),
            canonical_url,
            release_media,
            ..Self::default()
        }
    }

    /// Reset before sending the media again.
    pub fn submitting() -> Self {
        Self {
            status: Some(UploadStatus::Uploading),
            progress: Some(0),
            count_attempt: true,
            ..Self::default()
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn with_related_job(mut self, job_id: impl Into<String>) -> Self {
        self.related_job_id = Some(job_id.into());
        self
    }

    pub fn releasing_media(mut self) -> Self {
        self.release_media = true;
        self
    }
}

/// Result of applying a patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The patch produced a new record; `released` is the handle it dropped.
    Applied {
        record: UploadRecord,
        released: Option<MediaHandle>,
    },
    /// The patch was issued before the last applied update and is ignored.
    Stale { revision: u64 },
}

impl Transition {
    pub fn is_stale(&self) -> bool {
        matches!(self, Transition::Stale { .. })
    }
}

/// Merge `patch` into `current` under sequence number `seq`.
pub fn apply_patch(current: &UploadRecord, patch: &UploadPatch, seq: u64) -> Transition {
    if seq <= current.revision {
        return Transition::Stale {
            revision: current.revision,
        };
    }

    let mut next = current.clone();

    if let Some(status) = patch.status {
        next.status = status;
    }

    if let Some(progress) = patch.progress {
        next.progress = progress.min(100);
    }
    if next.status == UploadStatus::Completed {
        next.progress = 100;
    }

    if let Some(url) = &patch.canonical_url {
        next.canonical_url = Some(url.clone());
    }

    if next.related_job_id.is_none() {
        next.related_job_id = patch.related_job_id.clone();
    }

    next.error = if next.status == UploadStatus::Failed {
        patch
            .error
            .clone()
            .or_else(|| current.error.clone())
            .or_else(|| Some(DEFAULT_FAILURE.to_string()))
    } else {
        None
    };

    if patch.count_attempt {
        next.attempts = next.attempts.saturating_add(1);
    }

    let released = if patch.release_media {
        next.media.take()
    } else {
        None
    };

    next.revision = seq;
    next.updated_at = Utc::now();

    Transition::Applied {
        record: next,
        released,
    }
}

/// Merge `patch` and move the record to `new_id` in one step.
///
/// Registration time, job reference and metadata carry over unchanged.
pub fn rekey(current: &UploadRecord, new_id: UploadId, patch: &UploadPatch, seq: u64) -> Transition {
    match apply_patch(current, patch, seq) {
        Transition::Applied {
            mut record,
            released,
        } => {
            record.id = new_id;
            Transition::Applied { record, released }
        }
        stale => stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadMetadata;

    fn record() -> UploadRecord {
        UploadRecord::new(
            UploadId::from("tmp1"),
            Some(MediaHandle::from_string("blob:tmp1")),
            UploadMetadata::new("Intro", "video/mp4"),
            Some("job9".into()),
        )
    }

    fn applied(t: Transition) -> (UploadRecord, Option<MediaHandle>) {
        match t {
            Transition::Applied { record, released } => (record, released),
            Transition::Stale { revision } => panic!("unexpected stale transition at {}", revision),
        }
    }

    #[test]
    fn test_patch_wins_and_preserves_rest() {
        let current = record();
        let (next, released) = applied(apply_patch(&current, &UploadPatch::progress(40), 1));

        assert_eq!(next.progress, 40);
        assert_eq!(next.status, UploadStatus::Uploading);
        assert_eq!(next.media, current.media);
        assert_eq!(next.revision, 1);
        assert!(released.is_none());
    }

    #[test]
    fn test_stale_patch_rejected() {
        let current = record();
        let (next, _) = applied(apply_patch(&current, &UploadPatch::processing(), 5));

        let t = apply_patch(&next, &UploadPatch::failed("late"), 3);
        assert_eq!(t, Transition::Stale { revision: 5 });

        // Same sequence applied twice is also stale
        assert!(apply_patch(&next, &UploadPatch::processing(), 5).is_stale());
    }

    #[test]
    fn test_error_only_while_failed() {
        let current = record();
        let (failed, _) = applied(apply_patch(&current, &UploadPatch::failed("boom"), 1));
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let (retrying, _) = applied(apply_patch(&failed, &UploadPatch::submitting(), 2));
        assert_eq!(retrying.status, UploadStatus::Uploading);
        assert_eq!(retrying.error, None);
        assert_eq!(retrying.attempts, 1);

        let (bare, _) = applied(apply_patch(&retrying, &UploadPatch::status(UploadStatus::Failed), 3));
        assert_eq!(bare.error.as_deref(), Some(DEFAULT_FAILURE));
    }

    #[test]
    fn test_completed_releases_media_with_url() {
        let current = record();
        let patch = UploadPatch::completed(Some("https://cdn/srv1.mp4".into()));
        let (next, released) = applied(apply_patch(&current, &patch, 1));

        assert_eq!(next.status, UploadStatus::Completed);
        assert_eq!(next.progress, 100);
        assert!(next.media.is_none());
        assert_eq!(released, current.media);

        let (kept, released) = applied(apply_patch(&current, &UploadPatch::completed(None), 1));
        assert!(kept.media.is_some());
        assert!(released.is_none());
    }

    #[test]
    fn test_related_job_is_immutable() {
        let current = record();
        let patch = UploadPatch::processing().with_related_job("job-other");
        let (next, _) = applied(apply_patch(&current, &patch, 1));
        assert_eq!(next.related_job_id.as_deref(), Some("job9"));

        let mut unlinked = record();
        unlinked.related_job_id = None;
        let (linked, _) = applied(apply_patch(&unlinked, &patch, 1));
        assert_eq!(linked.related_job_id.as_deref(), Some("job-other"));
    }

    #[test]
    fn test_rekey_preserves_identity_metadata() {
        let current = record();
        let (next, _) = applied(rekey(&current, UploadId::from("srv1"), &UploadPatch::processing(), 1));

        assert_eq!(next.id.as_str(), "srv1");
        assert_eq!(next.submitted_at, current.submitted_at);
        assert_eq!(next.related_job_id, current.related_job_id);
        assert_eq!(next.metadata, current.metadata);
        assert_eq!(next.status, UploadStatus::Processing);
    }

    #[test]
    fn test_progress_clamped() {
        let (next, _) = applied(apply_patch(&record(), &UploadPatch::progress(250), 1));
        assert_eq!(next.progress, 100);
    }
}
