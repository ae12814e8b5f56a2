//! Local media store.
//!
//! Stands in for browser object URLs: media bytes are allocated under an
//! opaque handle and released when the owning record no longer needs them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::warn;

use reel_models::MediaHandle;

/// Allocates and releases local media buffers.
pub trait MediaStore: Send + Sync {
    /// Store `data` and return a fresh handle.
    fn allocate(&self, data: Bytes, media_type: &str) -> MediaHandle;

    /// Bytes behind `handle`, `None` once released.
    fn fetch(&self, handle: &MediaHandle) -> Option<Bytes>;

    fn contains(&self, handle: &MediaHandle) -> bool {
        self.fetch(handle).is_some()
    }

    /// Release `handle`. Returns `false` if it was not held; never panics.
    fn release(&self, handle: &MediaHandle) -> bool;
}

#[derive(Debug)]
struct MediaEntry {
    data: Bytes,
    media_type: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<MediaHandle, MediaEntry>,
    release_calls: HashMap<MediaHandle, u32>,
}

/// In-process media store.
///
/// Released buffers stay alive while an in-flight request still holds a
/// clone of the `Bytes`; the store only drops its own reference.
#[derive(Debug, Default)]
pub struct InMemoryMediaStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.lock().entries.len()
    }

    /// Total bytes held by live handles.
    pub fn live_bytes(&self) -> usize {
        self.lock().entries.values().map(|e| e.data.len()).sum()
    }

    /// How many times `release` was called for `handle`.
    pub fn release_calls(&self, handle: &MediaHandle) -> u32 {
        self.lock().release_calls.get(handle).copied().unwrap_or(0)
    }

    pub fn media_type(&self, handle: &MediaHandle) -> Option<String> {
        self.lock().entries.get(handle).map(|e| e.media_type.clone())
    }
}

impl MediaStore for InMemoryMediaStore {
    fn allocate(&self, data: Bytes, media_type: &str) -> MediaHandle {
        let handle = MediaHandle::new();
        self.lock().entries.insert(
            handle.clone(),
            MediaEntry {
                data,
                media_type: media_type.to_string(),
            },
        );
        handle
    }

    fn fetch(&self, handle: &MediaHandle) -> Option<Bytes> {
        self.lock().entries.get(handle).map(|e| e.data.clone())
    }

    fn release(&self, handle: &MediaHandle) -> bool {
        let mut inner = self.lock();
        *inner.release_calls.entry(handle.clone()).or_insert(0) += 1;

        if inner.entries.remove(handle).is_some() {
            true
        } else {
            warn!(handle = %handle, "Release of media handle that is not held");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_fetch_release() {
        let store = InMemoryMediaStore::new();
        let handle = store.allocate(Bytes::from_static(b"abc"), "video/mp4");

        assert!(store.contains(&handle));
        assert_eq!(store.live_bytes(), 3);
        assert_eq!(store.media_type(&handle).as_deref(), Some("video/mp4"));

        assert!(store.release(&handle));
        assert!(!store.contains(&handle));
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.release_calls(&handle), 1);
    }

    #[test]
    fn test_double_release_is_harmless() {
        let store = InMemoryMediaStore::new();
        let handle = store.allocate(Bytes::from_static(b"abc"), "video/mp4");

        assert!(store.release(&handle));
        assert!(!store.release(&handle));
        assert_eq!(store.release_calls(&handle), 2);
    }

    #[test]
    fn test_fetched_bytes_outlive_release() {
        let store = InMemoryMediaStore::new();
        let handle = store.allocate(Bytes::from_static(b"in-flight body"), "video/mp4");

        let body = store.fetch(&handle).unwrap();
        store.release(&handle);

        assert_eq!(&body[..], b"in-flight body");
    }
}
