//! Tracker metrics.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const UPLOADS_REGISTERED_TOTAL: &str = "reel_uploads_registered_total";
    pub const UPLOADS_TRACKED: &str = "reel_uploads_tracked";
    pub const STATUS_POLLS_TOTAL: &str = "reel_status_polls_total";
    pub const IDENTITY_REASSIGNED_TOTAL: &str = "reel_identity_reassigned_total";
    pub const IDENTITY_CONFLICTS_TOTAL: &str = "reel_identity_conflicts_total";
    pub const STALE_UPDATES_TOTAL: &str = "reel_stale_updates_total";
    pub const RETRIES_TOTAL: &str = "reel_retries_total";
    pub const MEDIA_RELEASED_TOTAL: &str = "reel_media_released_total";
}

pub fn record_registration() {
    counter!(names::UPLOADS_REGISTERED_TOTAL).increment(1);
}

pub fn set_tracked(count: usize) {
    gauge!(names::UPLOADS_TRACKED).set(count as f64);
}

/// Record one status poll by outcome.
pub fn record_poll(outcome: &'static str) {
    counter!(names::STATUS_POLLS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_reassignment() {
    counter!(names::IDENTITY_REASSIGNED_TOTAL).increment(1);
}

pub fn record_identity_conflict() {
    counter!(names::IDENTITY_CONFLICTS_TOTAL).increment(1);
}

pub fn record_stale_update() {
    counter!(names::STALE_UPDATES_TOTAL).increment(1);
}

/// Record a retry by recovery path (`local` or `server`).
pub fn record_retry(path: &'static str) {
    counter!(names::RETRIES_TOTAL, "path" => path).increment(1);
}

pub fn record_media_released() {
    counter!(names::MEDIA_RELEASED_TOTAL).increment(1);
}
