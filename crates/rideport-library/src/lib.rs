//! RidePort Library - the local ride library on disk
//!
//! [`DirectoryRideLibrary`] implements [`IRideLibrary`] over a plain
//! directory. Rides are committed into the directory by the core's finalizer;
//! the library records each one in a JSON index (`.rideport-index.json`)
//! inside the same directory.
//!
//! ## Design Decisions
//!
//! - **Atomic index writes**: the index is written to a temporary file and
//!   renamed over the old one.
//! - **Upsert**: re-adding an overwritten ride refreshes its entry instead of
//!   duplicating it.
//! - **Serialized updates**: index read-modify-write runs under a mutex.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rideport_core::ports::IRideLibrary;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// File name of the index kept in the library root
pub const INDEX_FILE_NAME: &str = ".rideport-index.json";

/// One ride recorded in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_name: String,
    pub added_at: DateTime<Utc>,
}

/// On-disk index format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LibraryIndex {
    rides: Vec<IndexEntry>,
}

/// A ride as listed to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub file_name: String,
    pub added_at: DateTime<Utc>,
    /// Size of the file, `None` when it no longer exists
    pub size_bytes: Option<u64>,
}

/// Ride library stored in a single directory
#[derive(Debug)]
pub struct DirectoryRideLibrary {
    root: PathBuf,
    lock: Mutex<()>,
}

impl DirectoryRideLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the index file
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    async fn read_index(&self) -> anyhow::Result<LibraryIndex> {
        let path = self.index_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt library index {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LibraryIndex::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    async fn write_index(&self, index: &LibraryIndex) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.index_path();
        let tmp_path = self.root.join(format!("{INDEX_FILE_NAME}.tmp"));

        let data = serde_json::to_vec_pretty(index)?;
        tokio::fs::write(&tmp_path, data)
            .await
            .with_context(|| format!("cannot write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    /// Rides recorded in the index, ordered by file name
    ///
    /// File names sort chronologically because they encode the start time.
    pub async fn list(&self) -> anyhow::Result<Vec<LibraryEntry>> {
        let index = self.read_index().await?;
        let mut entries = Vec::with_capacity(index.rides.len());
        for ride in index.rides {
            let size_bytes = tokio::fs::metadata(self.root.join(&ride.file_name))
                .await
                .ok()
                .map(|m| m.len());
            if size_bytes.is_none() {
                warn!(file = %ride.file_name, "Indexed ride missing from library");
            }
            entries.push(LibraryEntry {
                file_name: ride.file_name,
                added_at: ride.added_at,
                size_bytes,
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl IRideLibrary for DirectoryRideLibrary {
    fn root(&self) -> &Path {
        &self.root
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn add_ride(&self, file_name: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;

        let mut index = self.read_index().await?;
        let now = Utc::now();
        match index.rides.iter_mut().find(|r| r.file_name == file_name) {
            Some(entry) => entry.added_at = now,
            None => index.rides.push(IndexEntry {
                file_name: file_name.to_string(),
                added_at: now,
            }),
        }
        self.write_index(&index).await?;

        debug!(rides = index.rides.len(), "Ride added to library index");
        Ok(())
    }
}
