//! Shared data models for the Reel upload tracker.
//!
//! This crate provides Serde-serializable types for:
//! - Upload records and their lifecycle status
//! - Registration candidates and upload metadata
//! - Opaque local media handles
//! - Status Service responses
//! - Pure state-transition functions applied by the tracker

pub mod candidate;
pub mod media;
pub mod remote;
pub mod transition;
pub mod upload;

// Re-export common types
pub use candidate::UploadCandidate;
pub use media::MediaHandle;
pub use remote::{RemoteState, RemoteStatus};
pub use transition::{Transition, UploadPatch};
pub use upload::{Recovery, UploadId, UploadMetadata, UploadRecord, UploadStatus};
