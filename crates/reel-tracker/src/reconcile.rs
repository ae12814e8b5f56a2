//! Reconciliation loop.
//!
//! Periodically asks the Status Service about every pending upload and folds
//! the answers back into the tracker:
//! - completed uploads move to their canonical server id and drop local media
//! - failed uploads keep their media so they can be resubmitted
//! - uploads the server no longer knows are marked failed
//! - permanent poll errors mark the upload failed with the error
//! - transient errors leave the record untouched for the next tick

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use reel_client::ClientResult;
use reel_models::{RemoteState, RemoteStatus, UploadId, UploadPatch, UploadStatus};

use crate::metrics;
use crate::tracker::UploadTracker;

/// Error recorded when the server reports a failure without a message.
pub const REMOTE_FAILURE: &str = "Processing failed on the server";

/// Error recorded when the server does not know the upload.
pub const NOT_FOUND_FAILURE: &str = "Upload not found on server";

/// Outcome counts of one reconciliation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Status requests issued
    pub polled: usize,
    pub completed: usize,
    pub failed: usize,
    /// Uploads the server reported as not found
    pub lost: usize,
    /// Polls that failed transiently or timed out; retried next tick
    pub transient: usize,
    /// Pending uploads not polled (placeholder id or submission in flight)
    pub skipped: usize,
}

/// Result of one bounded status poll.
enum PollOutcome {
    Answered(ClientResult<RemoteStatus>),
    TimedOut,
}

struct PollTarget {
    id: UploadId,
    status: UploadStatus,
    seq: u64,
}

impl UploadTracker {
    /// Run a single reconciliation tick.
    pub async fn reconcile_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let targets: Vec<PollTarget> = {
            let state = self.state.lock().await;
            let mut targets = Vec::new();
            for record in state.records.values().filter(|r| r.status.is_pending()) {
                if !record.id.is_server_resolvable() || state.in_flight.contains(&record.id) {
                    report.skipped += 1;
                    continue;
                }
                targets.push(PollTarget {
                    id: record.id.clone(),
                    status: record.status,
                    seq: self.next_seq(),
                });
            }
            targets
        };

        if targets.is_empty() {
            return report;
        }
        report.polled = targets.len();

        let bound = self.config.poll_interval;
        let polls = targets.into_iter().map(|target| async move {
            let outcome = match timeout(bound, self.status.get_status(target.id.as_str())).await {
                Ok(result) => PollOutcome::Answered(result),
                Err(_) => PollOutcome::TimedOut,
            };
            (target, outcome)
        });

        for (target, outcome) in join_all(polls).await {
            self.apply_poll(target, outcome, &mut report).await;
        }

        debug!(
            polled = report.polled,
            completed = report.completed,
            failed = report.failed,
            lost = report.lost,
            transient = report.transient,
            skipped = report.skipped,
            "Reconciliation tick complete"
        );
        report
    }

    async fn apply_poll(&self, target: PollTarget, outcome: PollOutcome, report: &mut ReconcileReport) {
        let PollTarget { id, status, seq } = target;

        let remote = match outcome {
            PollOutcome::Answered(Ok(remote)) => remote,
            PollOutcome::Answered(Err(e)) if e.is_not_found() => {
                metrics::record_poll("not_found");
                warn!(upload_id = %id, "Upload not found on server, marking failed");
                if self
                    .update_status(&id, UploadPatch::failed(NOT_FOUND_FAILURE).with_seq(seq))
                    .await
                    .is_some()
                {
                    report.lost += 1;
                }
                return;
            }
            PollOutcome::Answered(Err(e)) if e.is_transient() => {
                metrics::record_poll("transient");
                report.transient += 1;
                debug!(upload_id = %id, "Status poll failed, retrying next tick: {}", e);
                return;
            }
            PollOutcome::Answered(Err(e)) => {
                metrics::record_poll("error");
                warn!(upload_id = %id, "Status poll rejected, marking failed: {}", e);
                if self
                    .update_status(&id, UploadPatch::failed(e.to_string()).with_seq(seq))
                    .await
                    .is_some()
                {
                    report.failed += 1;
                }
                return;
            }
            PollOutcome::TimedOut => {
                metrics::record_poll("timeout");
                report.transient += 1;
                debug!(upload_id = %id, "Status poll timed out");
                return;
            }
        };

        match remote.state {
            RemoteState::Completed => {
                metrics::record_poll("completed");
                let canonical = remote
                    .canonical_id
                    .filter(|c| !c.is_empty())
                    .map(UploadId::from)
                    .unwrap_or_else(|| id.clone());
                let patch = UploadPatch::completed(remote.canonical_url).with_seq(seq);

                let applied = if canonical != id {
                    self.reassign_identity(&id, &canonical, patch).await
                } else {
                    self.update_status(&id, patch).await
                };
                if applied.is_some() {
                    report.completed += 1;
                    info!(upload_id = %canonical, "Upload completed");
                }
            }
            RemoteState::Failed => {
                metrics::record_poll("failed");
                let message = remote
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| REMOTE_FAILURE.to_string());
                warn!(upload_id = %id, error = %message, "Upload failed on the server");
                if self
                    .update_status(&id, UploadPatch::failed(message).with_seq(seq))
                    .await
                    .is_some()
                {
                    report.failed += 1;
                }
            }
            RemoteState::Processing => {
                metrics::record_poll("processing");
                if status == UploadStatus::Uploading {
                    self.update_status(&id, UploadPatch::processing().with_seq(seq)).await;
                }
            }
        }
    }

    /// Spawn the reconciliation loop on the current runtime.
    ///
    /// The loop ticks every `poll_interval`, skipping missed ticks, until
    /// the returned handle is stopped or dropped.
    pub fn start_reconciliation(self: &Arc<Self>) -> ReconcileHandle {
        let (stop, mut stop_rx) = watch::channel(false);
        let tracker = Arc::clone(self);
        let period = tracker.config.poll_interval;

        let task = tokio::spawn(async move {
            info!("Starting reconciliation loop (interval: {:?})", period);

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracker.reconcile_once().await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Reconciliation loop stopped");
        });

        ReconcileHandle { stop, task }
    }
}

/// Handle to a running reconciliation loop.
pub struct ReconcileHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcileHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the loop and wait for the current tick to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!("Reconciliation task ended abnormally: {}", e);
        }
    }
}
