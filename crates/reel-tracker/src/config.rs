//! Tracker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Upload tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Interval between reconciliation ticks; also bounds each status poll
    pub poll_interval: Duration,
    /// Location of the JSON snapshot cache
    pub cache_path: PathBuf,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            cache_path: PathBuf::from(".reel/uploads.json"),
            event_capacity: 256,
        }
    }
}

impl TrackerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("REEL_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs: &u64| *secs > 0)
                    .unwrap_or(5),
            ),
            cache_path: std::env::var("REEL_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".reel/uploads.json")),
            event_capacity: std::env::var("REEL_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|cap: &usize| *cap > 0)
                .unwrap_or(256),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
