//! Snapshot cache for tracked uploads.
//!
//! The tracker rewrites the whole snapshot after every mutation and reads it
//! back verbatim at session start. Records never carry media handles.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use reel_models::UploadRecord;

use crate::error::CacheResult;

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Key/value snapshot store owned by the caller.
#[async_trait]
pub trait PersistentCache: Send + Sync {
    async fn load(&self) -> CacheResult<Vec<UploadRecord>>;
    async fn save(&self, records: &[UploadRecord]) -> CacheResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    records: Vec<UploadRecord>,
}

fn encode(records: &[UploadRecord]) -> CacheResult<String> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        records: records.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

fn decode(raw: &str) -> CacheResult<Vec<UploadRecord>> {
    let snapshot: Snapshot = serde_json::from_str(raw)?;
    Ok(snapshot.records)
}

// =============================================================================
// JSON file
// =============================================================================

/// Cache backed by a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "uploads.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistentCache for JsonFileCache {
    async fn load(&self) -> CacheResult<Vec<UploadRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No upload cache yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        decode(&raw)
    }

    async fn save(&self, records: &[UploadRecord]) -> CacheResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let payload = encode(records)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, payload).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

// =============================================================================
// In memory
// =============================================================================

/// Cache kept in process memory, serialized exactly like the file cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    raw: Mutex<Option<String>>,
    saves: Mutex<u64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded content of the last save.
    pub fn snapshot(&self) -> Vec<UploadRecord> {
        let raw = match self.raw.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        raw.and_then(|r| decode(&r).ok()).unwrap_or_default()
    }

    pub fn save_count(&self) -> u64 {
        match self.saves.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PersistentCache for MemoryCache {
    async fn load(&self) -> CacheResult<Vec<UploadRecord>> {
        Ok(self.snapshot())
    }

    async fn save(&self, records: &[UploadRecord]) -> CacheResult<()> {
        let payload = encode(records)?;
        match self.raw.lock() {
            Ok(mut guard) => *guard = Some(payload),
            Err(poisoned) => *poisoned.into_inner() = Some(payload),
        }
        match self.saves.lock() {
            Ok(mut guard) => *guard += 1,
            Err(poisoned) => *poisoned.into_inner() += 1,
        }
        Ok(())
    }
}
