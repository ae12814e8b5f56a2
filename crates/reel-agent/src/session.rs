//! One agent run: stage local files, submit them, wait for them to settle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{info, warn};

use reel_models::{UploadCandidate, UploadMetadata, UploadRecord, UploadStatus};
use reel_tracker::{InMemoryMediaStore, MediaStore, TrackerEvent, UploadTracker};

/// Media type for a video file, from its extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Untitled video")
        .to_string()
}

pub struct Session {
    tracker: Arc<UploadTracker>,
    media: Arc<InMemoryMediaStore>,
}

impl Session {
    pub fn new(tracker: Arc<UploadTracker>, media: Arc<InMemoryMediaStore>) -> Self {
        Self { tracker, media }
    }

    /// Read `path` into the media store and register it.
    pub async fn stage(&self, path: &Path, title: Option<&str>, job_id: Option<&str>) -> Result<UploadRecord> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let media_type = media_type_for(path);
        let handle = self.media.allocate(Bytes::from(data), media_type);

        let title = title.map(str::to_string).unwrap_or_else(|| default_title(path));
        let mut candidate = UploadCandidate::new(handle.clone(), UploadMetadata::new(title, media_type));
        if let Some(job) = job_id {
            candidate = candidate.for_job(job);
        }

        match self.tracker.register_local_upload(candidate).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.media.release(&handle);
                Err(e).with_context(|| format!("Failed to register {}", path.display()))
            }
        }
    }

    /// Stage and submit every file. Per-file failures are logged, not fatal.
    pub async fn upload_all(&self, files: &[PathBuf], title: Option<&str>, job_id: Option<&str>) -> usize {
        let mut submitted = 0;
        for path in files {
            let record = match self.stage(path, title, job_id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), "Skipping file: {:#}", e);
                    continue;
                }
            };

            match self.tracker.submit(&record.id).await {
                Ok(record) => {
                    submitted += 1;
                    info!(path = %path.display(), upload_id = %record.id, "Upload accepted");
                }
                Err(e) => warn!(path = %path.display(), upload_id = %record.id, "Upload failed: {}", e),
            }
        }
        submitted
    }

    /// Retry every failed upload left over from a previous session.
    pub async fn retry_failed(&self) -> usize {
        let failed: Vec<UploadRecord> = self
            .tracker
            .list()
            .await
            .into_iter()
            .filter(|r| r.status == UploadStatus::Failed)
            .collect();

        let mut retried = 0;
        for record in failed {
            match self.tracker.retry(&record.id).await {
                Ok(_) => retried += 1,
                Err(e) => warn!(upload_id = %record.id, "Retry failed: {}", e),
            }
        }
        retried
    }

    /// Wait until no upload is pending, polling every `every`.
    pub async fn wait_settled(&self, every: Duration) {
        let mut events = self.tracker.subscribe();
        loop {
            if self.tracker.pending_count().await == 0 {
                return;
            }

            tokio::select! {
                event = events.recv() => {
                    if let Ok(TrackerEvent::IdentityChanged { old_id, new_id }) = event {
                        info!(old_id = %old_id, new_id = %new_id, "Upload identified by server");
                    }
                }
                _ = tokio::time::sleep(every) => {}
            }
        }
    }

    /// Print one line per record; returns the number of failed uploads.
    pub async fn print_summary(&self) -> usize {
        let records = self.tracker.list().await;
        if records.is_empty() {
            println!("No uploads tracked.");
            return 0;
        }

        for record in &records {
            println!("{}", summary_line(record));
        }
        records
            .iter()
            .filter(|r| r.status == UploadStatus::Failed)
            .count()
    }
}

fn summary_line(record: &UploadRecord) -> String {
    let detail = match record.status {
        UploadStatus::Completed => record.canonical_url.clone().unwrap_or_default(),
        UploadStatus::Failed => record.error.clone().unwrap_or_default(),
        _ => format!("{}%", record.progress),
    };
    format!("{:<40} {:<10} {}", record.id.as_str(), record.status.as_str(), detail)
}
