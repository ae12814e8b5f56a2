//! Client-side upload lifecycle tracking.
//!
//! This crate provides:
//! - `UploadTracker`, the owned collection of upload records
//! - Identity reconciliation from temporary ids to server ids
//! - A cancellable reconciliation loop polling the Status Service
//! - Retry and removal with exactly-once release of local media
//! - Snapshot caches (JSON file, in memory) and an in-memory media store

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod metrics;
pub mod reconcile;
pub mod tracker;


pub use cache::{JsonFileCache, MemoryCache, PersistentCache};
pub use config::TrackerConfig;
pub use error::{CacheError, CacheResult, TrackerError, TrackerResult};
pub use events::TrackerEvent;
pub use media::{InMemoryMediaStore, MediaStore};
pub use reconcile::{ReconcileHandle, ReconcileReport};
pub use tracker::UploadTracker;
