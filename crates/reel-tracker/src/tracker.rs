//! Upload tracker: the owned collection of upload records.
//!
//! Every mutation runs inside one critical section over the collection,
//! including the cache rewrite, so callers never observe a half-applied
//! change. Service calls happen outside the lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use reel_client::{StatusService, SubmitMetadata, UploadService};
use reel_models::transition::{apply_patch, rekey};
use reel_models::{
    MediaHandle, Transition, UploadCandidate, UploadId, UploadPatch, UploadRecord, UploadStatus,
};

use crate::cache::PersistentCache;
use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::events::TrackerEvent;
use crate::media::MediaStore;
use crate::metrics;

#[derive(Debug, Default)]
pub(crate) struct TrackerState {
    pub(crate) records: HashMap<UploadId, UploadRecord>,
    /// Retired id -> id that replaced it
    pub(crate) aliases: HashMap<UploadId, UploadId>,
    /// Records with a submission in flight
    pub(crate) in_flight: HashSet<UploadId>,
}

impl TrackerState {
    fn snapshot(&self) -> Vec<UploadRecord> {
        let mut records: Vec<UploadRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    fn resolve(&self, id: &UploadId) -> UploadId {
        let mut current = id.clone();
        // Alias chains are short; the bound guards against a cycle
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    fn owner_of(&self, handle: &MediaHandle) -> Option<&UploadId> {
        self.records
            .values()
            .find(|r| r.media.as_ref() == Some(handle))
            .map(|r| &r.id)
    }
}

/// Media and metadata captured when a submission starts.
struct PreparedSubmission {
    media: Bytes,
    metadata: SubmitMetadata,
}

/// Tracks uploads from local registration to server-side completion.
pub struct UploadTracker {
    pub(crate) state: Mutex<TrackerState>,
    seq: AtomicU64,
    uploads: Arc<dyn UploadService>,
    pub(crate) status: Arc<dyn StatusService>,
    media: Arc<dyn MediaStore>,
    cache: Arc<dyn PersistentCache>,
    events: broadcast::Sender<TrackerEvent>,
    pub(crate) config: TrackerConfig,
}

impl UploadTracker {
    /// Create an empty tracker for a new session.
    pub fn new(
        config: TrackerConfig,
        uploads: Arc<dyn UploadService>,
        status: Arc<dyn StatusService>,
        media: Arc<dyn MediaStore>,
        cache: Arc<dyn PersistentCache>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            state: Mutex::new(TrackerState::default()),
            seq: AtomicU64::new(0),
            uploads,
            status,
            media,
            cache,
            events,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Issue the sequence number for a request about to be sent.
    ///
    /// Updates carrying an older number than the one last applied to a
    /// record are discarded.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Sequence number for `patch`: its own if it carries one, else a fresh one.
    ///
    /// A caller-supplied number advances the counter so that numbers issued
    /// afterwards still order after it.
    fn sequence(&self, patch: &UploadPatch) -> u64 {
        match patch.seq {
            Some(seq) => {
                self.seq.fetch_max(seq, Ordering::SeqCst);
                seq
            }
            None => self.next_seq(),
        }
    }

    fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &UploadId) -> Option<UploadRecord> {
        self.state.lock().await.records.get(id).cloned()
    }

    /// All records, oldest first.
    pub async fn list(&self) -> Vec<UploadRecord> {
        self.state.lock().await.snapshot()
    }

    /// Current id of an upload, following replaced temporary ids.
    pub async fn resolve(&self, id: &UploadId) -> Option<UploadId> {
        let state = self.state.lock().await;
        let current = state.resolve(id);
        state.records.contains_key(&current).then_some(current)
    }

    /// Number of uploads not yet completed or failed.
    pub async fn pending_count(&self) -> usize {
        self.state
            .lock()
            .await
            .records
            .values()
            .filter(|r| r.status.is_pending())
            .count()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Load the cached snapshot. Restored records hold no local media.
    pub async fn restore(&self) -> TrackerResult<usize> {
        let cached = self.cache.load().await?;
        let mut state = self.state.lock().await;

        let mut restored = 0;
        for mut record in cached {
            if state.records.contains_key(&record.id) {
                warn!(upload_id = %record.id, "Duplicate upload in cache, keeping first");
                continue;
            }
            record.media = None;
            record.revision = 0;
            state.records.insert(record.id.clone(), record);
            restored += 1;
        }

        metrics::set_tracked(state.records.len());
        info!(restored, "Restored uploads from cache");
        Ok(restored)
    }

    /// Release every held media buffer, keeping the records (session end).
    pub async fn close(&self) -> usize {
        let mut state = self.state.lock().await;

        let mut released = Vec::new();
        for record in state.records.values_mut() {
            if let Some(handle) = record.media.take() {
                released.push((record.id.clone(), handle));
            }
        }
        self.persist(&state).await;

        let count = released.len();
        for (id, handle) in released {
            self.release(&id, handle);
        }
        info!(released = count, "Upload tracker closed");
        count
    }

    /// Remove every record and release its media.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let records: Vec<UploadRecord> = state.records.drain().map(|(_, r)| r).collect();
        state.aliases.clear();
        state.in_flight.clear();
        self.persist(&state).await;

        let count = records.len();
        for mut record in records {
            if let Some(handle) = record.media.take() {
                self.release(&record.id, handle);
            }
            self.emit(TrackerEvent::Removed { id: record.id });
        }
        count
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Start tracking a local upload.
    ///
    /// Registering an id that is already tracked (or was replaced by a
    /// server id) returns the existing record unchanged.
    pub async fn register_local_upload(&self, candidate: UploadCandidate) -> TrackerResult<UploadRecord> {
        let mut state = self.state.lock().await;

        let current = state.resolve(&candidate.id);
        if let Some(existing) = state.records.get(&current) {
            debug!(upload_id = %candidate.id, current_id = %current, "Upload already registered");
            return Ok(existing.clone());
        }

        candidate.validate().map_err(TrackerError::Validation)?;

        if let Some(owner) = state.owner_of(&candidate.media) {
            return Err(TrackerError::validation(format!(
                "media handle {} already belongs to upload {}",
                candidate.media, owner
            )));
        }
        if !self.media.contains(&candidate.media) {
            return Err(TrackerError::validation(format!(
                "media handle {} is not held by the media store",
                candidate.media
            )));
        }

        let mut record = candidate.into_record();
        record.revision = self.next_seq();
        state.records.insert(record.id.clone(), record.clone());
        self.persist(&state).await;

        metrics::record_registration();
        info!(
            upload_id = %record.id,
            related_job_id = ?record.related_job_id,
            title = %record.metadata.title,
            "Registered local upload"
        );
        self.emit(TrackerEvent::Registered {
            id: record.id.clone(),
        });
        Ok(record)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Merge `patch` into the record. Unknown ids and stale patches are
    /// logged and ignored (`None`).
    pub async fn update_status(&self, id: &UploadId, patch: UploadPatch) -> Option<UploadRecord> {
        let seq = self.sequence(&patch);
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, id, &patch, seq).await
    }

    pub(crate) async fn apply_locked(
        &self,
        state: &mut TrackerState,
        id: &UploadId,
        patch: &UploadPatch,
        seq: u64,
    ) -> Option<UploadRecord> {
        let Some(current) = state.records.get(id) else {
            info!(upload_id = %id, "Ignoring update for unknown upload");
            return None;
        };

        match apply_patch(current, patch, seq) {
            Transition::Stale { revision } => {
                metrics::record_stale_update();
                debug!(upload_id = %id, seq, revision, "Discarding stale update");
                None
            }
            Transition::Applied { record, released } => {
                state.records.insert(id.clone(), record.clone());
                self.persist(state).await;

                if let Some(handle) = released {
                    self.release(id, handle);
                }
                debug!(upload_id = %id, status = %record.status, seq, "Upload updated");
                self.emit(TrackerEvent::Updated {
                    id: id.clone(),
                    status: record.status,
                });
                Some(record)
            }
        }
    }

    /// Move a record from `old_id` to `new_id`, merging `patch`.
    ///
    /// Returns `None` without changes when `old_id` is unknown, when `new_id`
    /// is already tracked (a repeated reconciliation), or when the patch is
    /// stale.
    pub async fn reassign_identity(
        &self,
        old_id: &UploadId,
        new_id: &UploadId,
        patch: UploadPatch,
    ) -> Option<UploadRecord> {
        if old_id == new_id {
            return self.update_status(old_id, patch).await;
        }

        let seq = self.sequence(&patch);
        let mut state = self.state.lock().await;

        if state.records.contains_key(new_id) {
            metrics::record_identity_conflict();
            warn!(old_id = %old_id, new_id = %new_id, "Identity already assigned, skipping reassignment");
            return None;
        }

        let Some(current) = state.records.get(old_id) else {
            warn!(old_id = %old_id, new_id = %new_id, "Cannot reassign unknown upload");
            return None;
        };

        let (record, released) = match rekey(current, new_id.clone(), &patch, seq) {
            Transition::Applied { record, released } => (record, released),
            Transition::Stale { revision } => {
                metrics::record_stale_update();
                debug!(old_id = %old_id, seq, revision, "Discarding stale reassignment");
                return None;
            }
        };

        state.records.remove(old_id);
        state.records.insert(new_id.clone(), record.clone());
        for target in state.aliases.values_mut() {
            if target == old_id {
                *target = new_id.clone();
            }
        }
        state.aliases.insert(old_id.clone(), new_id.clone());
        self.persist(&state).await;

        if let Some(handle) = released {
            self.release(new_id, handle);
        }

        metrics::record_reassignment();
        info!(old_id = %old_id, new_id = %new_id, status = %record.status, "Upload identity reassigned");
        self.emit(TrackerEvent::IdentityChanged {
            old_id: old_id.clone(),
            new_id: new_id.clone(),
        });
        self.emit(TrackerEvent::Updated {
            id: new_id.clone(),
            status: record.status,
        });
        Some(record)
    }

    // =========================================================================
    // Submission and retry
    // =========================================================================

    /// Send a registered upload's local media to the Upload Service.
    pub async fn submit(&self, id: &UploadId) -> TrackerResult<UploadRecord> {
        let prepared = {
            let mut state = self.state.lock().await;
            let record = state.records.get(id).ok_or_else(|| TrackerError::unknown(id))?;
            if record.status != UploadStatus::Uploading {
                return Err(TrackerError::validation(format!(
                    "upload {} is {}, only uploading records can be submitted",
                    id, record.status
                )));
            }
            self.prepare_submission(&mut state, id).await?
        };

        self.finish_submission(id, prepared).await
    }

    /// Retry a failed upload.
    ///
    /// Completed uploads are refused with `Conflict`, other states with
    /// `Validation`.
    ///
    /// With local media still held the upload is reset and resubmitted;
    /// otherwise the record is optimistically set to `processing` and the
    /// reconciliation loop confirms the server's answer.
    pub async fn retry(&self, id: &UploadId) -> TrackerResult<UploadRecord> {
        let prepared = {
            let mut state = self.state.lock().await;
            let record = state.records.get(id).ok_or_else(|| TrackerError::unknown(id))?;
            match record.status {
                UploadStatus::Failed => {}
                // Completion already released the local media
                UploadStatus::Completed => {
                    return Err(TrackerError::conflict(format!(
                        "upload {} already completed, nothing to retry",
                        id
                    )));
                }
                status => {
                    return Err(TrackerError::validation(format!(
                        "upload {} is {}, only failed uploads can be retried",
                        id, status
                    )));
                }
            }

            if record.media.is_none() {
                metrics::record_retry("server");
                let seq = self.next_seq();
                let updated = self
                    .apply_locked(&mut state, id, &UploadPatch::processing(), seq)
                    .await
                    .ok_or_else(|| TrackerError::unknown(id))?;
                info!(upload_id = %id, "Retry requested from server");
                return Ok(updated);
            }

            metrics::record_retry("local");
            self.prepare_submission(&mut state, id).await?
        };

        info!(upload_id = %id, "Resubmitting upload from local media");
        self.finish_submission(id, prepared).await
    }

    /// Reset the record for a new submission and capture its media.
    async fn prepare_submission(
        &self,
        state: &mut TrackerState,
        id: &UploadId,
    ) -> TrackerResult<PreparedSubmission> {
        if state.in_flight.contains(id) {
            return Err(TrackerError::conflict(format!("upload {} is already being submitted", id)));
        }

        let record = state.records.get(id).ok_or_else(|| TrackerError::unknown(id))?;
        let handle = record
            .media
            .clone()
            .ok_or_else(|| TrackerError::validation(format!("upload {} has no local media", id)))?;

        let Some(media) = self.media.fetch(&handle) else {
            warn!(upload_id = %id, handle = %handle, "Local media was revoked, refusing submission");
            return Err(TrackerError::conflict(format!(
                "local media of upload {} was already released",
                id
            )));
        };
        let metadata = SubmitMetadata::from_record(record);

        let seq = self.next_seq();
        self.apply_locked(state, id, &UploadPatch::submitting(), seq)
            .await
            .ok_or_else(|| TrackerError::unknown(id))?;
        state.in_flight.insert(id.clone());

        Ok(PreparedSubmission { media, metadata })
    }

    /// Send the media and fold the outcome back into the record.
    ///
    /// The record is not polled while its submission is in flight, so the
    /// outcome is sequenced when it arrives.
    async fn finish_submission(
        &self,
        id: &UploadId,
        prepared: PreparedSubmission,
    ) -> TrackerResult<UploadRecord> {
        let result = self.uploads.submit(prepared.media, &prepared.metadata).await;

        let outcome = match result {
            Ok(receipt) => {
                let server_id = UploadId::from(receipt.server_id);
                let reassigned = self
                    .reassign_identity(id, &server_id, UploadPatch::processing())
                    .await;
                match reassigned {
                    Some(record) => Ok(record),
                    None => {
                        if self.get(&server_id).await.is_some() {
                            Err(TrackerError::conflict(format!(
                                "server id {} is already tracked",
                                server_id
                            )))
                        } else {
                            Err(TrackerError::unknown(id))
                        }
                    }
                }
            }
            Err(e) => {
                warn!(upload_id = %id, "Upload submission failed: {}", e);
                self.update_status(id, UploadPatch::failed(e.to_string())).await;
                Err(TrackerError::Upload(e))
            }
        };

        self.state.lock().await.in_flight.remove(id);
        outcome
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove an upload and release its local media.
    ///
    /// Removing an id that is not tracked (e.g. a second, concurrent
    /// removal) is a no-op returning `None`.
    pub async fn remove(&self, id: &UploadId) -> Option<UploadRecord> {
        let mut state = self.state.lock().await;

        let Some(mut record) = state.records.remove(id) else {
            debug!(upload_id = %id, "Upload already removed");
            return None;
        };
        state.in_flight.remove(id);
        state.aliases.retain(|_, target| target != id);
        self.persist(&state).await;

        // Taken under the lock: only this call can release it
        if let Some(handle) = record.media.take() {
            self.release(id, handle);
        }

        info!(upload_id = %id, status = %record.status, "Upload removed");
        self.emit(TrackerEvent::Removed { id: id.clone() });
        Some(record)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn release(&self, id: &UploadId, handle: MediaHandle) {
        if self.media.release(&handle) {
            metrics::record_media_released();
            debug!(upload_id = %id, handle = %handle, "Released local media");
        } else {
            warn!(upload_id = %id, handle = %handle, "Local media was already released");
        }
        self.emit(TrackerEvent::MediaReleased {
            id: id.clone(),
            handle,
        });
    }

    /// Rewrite the cache; failures are logged, the cache is not durable.
    async fn persist(&self, state: &TrackerState) {
        metrics::set_tracked(state.records.len());
        if let Err(e) = self.cache.save(&state.snapshot()).await {
            warn!("Failed to write upload cache: {}", e);
        }
    }
}
