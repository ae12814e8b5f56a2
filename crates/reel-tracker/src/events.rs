//! Tracker change notifications.

use reel_models::{MediaHandle, UploadId, UploadStatus};

/// Broadcast to subscribers after each applied change.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A new upload is tracked
    Registered { id: UploadId },
    /// Fields of an upload changed
    Updated { id: UploadId, status: UploadStatus },
    /// A temporary id was replaced; `old_id` is no longer valid
    IdentityChanged { old_id: UploadId, new_id: UploadId },
    /// The upload was removed by the user or on session clear
    Removed { id: UploadId },
    /// The local media buffer of an upload was released
    MediaReleased { id: UploadId, handle: MediaHandle },
}

impl TrackerEvent {
    /// Id the event refers to (the new id for identity changes).
    pub fn upload_id(&self) -> &UploadId {
        match self {
            TrackerEvent::Registered { id }
            | TrackerEvent::Updated { id, .. }
            | TrackerEvent::Removed { id }
            | TrackerEvent::MediaReleased { id, .. } => id,
            TrackerEvent::IdentityChanged { new_id, .. } => new_id,
        }
    }
}
