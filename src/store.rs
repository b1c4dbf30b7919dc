//! Index Store - JSON persistence for the project index
//!
//! The persisted index is one JSON document: metadata plus the components,
//! dependencies, and test-coverage maps. Loading an absent file yields an
//! empty index; loading a corrupt file logs the damage and resets to empty
//! rather than failing the caller.
//!
//! Cross-process safety: a lock file taken with `create_new` serializes the
//! load-modify-save cycle, and saves go through a uniquely named temp file
//! plus atomic rename so readers never observe a partial document.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Current on-disk index format version.
pub const INDEX_VERSION: &str = "0.1.0";

const LOCK_RETRIES: usize = 8;

/// Per-file component record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Classes defined in the file
    pub classes: BTreeSet<String>,
    /// Functions and methods defined in the file
    pub functions: BTreeSet<String>,
    /// Update-counter value when this entry was last written
    pub last_update: u64,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Wall-clock time of the last completed update cycle
    pub last_updated: String,
    /// Monotonic cycle counter, incremented once per update, never reset
    pub update_counter: u64,
    /// On-disk format version
    pub version: String,
}

impl Default for IndexMetadata {
    fn default() -> Self {
        Self {
            last_updated: String::new(),
            update_counter: 0,
            version: INDEX_VERSION.to_string(),
        }
    }
}

/// The persisted project index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index metadata
    pub metadata: IndexMetadata,
    /// File path -> component record
    pub components: BTreeMap<String, ComponentRecord>,
    /// File path -> referenced names (conservative superset)
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Component name -> test files exercising it
    pub test_coverage: BTreeMap<String, Vec<String>>,
}

/// JSON-backed store for the project index.
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    /// Create a store for the given index file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted index.
    ///
    /// Never fails on absence: a missing file yields a default empty index
    /// with `update_counter = 0`. A file that exists but fails to
    /// deserialize is recovered as empty after logging the corruption.
    pub fn load(&self) -> Index {
        if !self.path.exists() {
            return Index::default();
        }

        let read = fs::read_to_string(&self.path)
            .map_err(|e| Error::IndexCorrupt(e.to_string()))
            .and_then(|contents| {
                serde_json::from_str::<Index>(&contents)
                    .map_err(|e| Error::IndexCorrupt(e.to_string()))
            });

        match read {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(
                    "index at {} unreadable ({}); starting from empty",
                    self.path.display(),
                    e
                );
                Index::default()
            }
        }
    }

    /// Persist the full index.
    ///
    /// Writes to a uniquely named temp file and renames it over the target,
    /// so readers see either the old or the new document, never a partial
    /// one.
    pub fn save(&self, index: &Index) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(index)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Acquire the index lock, retrying with exponential backoff.
    ///
    /// Returns `Error::ConcurrentWriteConflict` when another process holds
    /// the lock past the retry budget. The returned guard removes the lock
    /// file on drop.
    pub fn lock(&self) -> Result<IndexLock> {
        let lock_path = self.path.with_extension("lock");
        let mut attempts = 0;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(IndexLock { path: lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempts >= LOCK_RETRIES {
                        return Err(Error::ConcurrentWriteConflict(format!(
                            "lock held at {} after {} attempts",
                            lock_path.display(),
                            attempts
                        )));
                    }
                    attempts += 1;
                    // 10ms, 20ms, 40ms, ...
                    let delay_ms = 10 * (1u64 << attempts.min(6));
                    tracing::debug!(
                        "index lock busy at {}, retrying in {}ms",
                        lock_path.display(),
                        delay_ms
                    );
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Temp file name unique across concurrent writers (PID + nanos).
    fn temp_path(&self) -> PathBuf {
        let pid = std::process::id();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            self.path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy(),
            pid,
            nanos
        ))
    }
}

/// Scoped index lock; releases (removes the lock file) on drop.
pub struct IndexLock {
    path: PathBuf,
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("failed to release index lock {}: {}", self.path.display(), e);
        }
    }
}
