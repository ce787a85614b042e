//! Persistent rendition store.
//!
//! Generating a derivative means decoding a full-size photo, which can take
//! hundreds of milliseconds. The store keeps finished renditions on disk so a
//! restarted process can serve them without decoding the source again.
//!
//! # Design
//!
//! The [`PersistentStore`] trait is the narrow seam the
//! [`Repository`](crate::repository::Repository) talks to: save, load, trim,
//! close. Everything behind it is replaceable; the repository treats every
//! failure as non-fatal and falls back to memory-only caching.
//!
//! [`DiskStore`] is the shipped implementation.
//!
//! ## Layout
//!
//! ```text
//! <dir>/
//! ├── .store-manifest.json     # index: key → file + production sequence
//! ├── 3f9a…c1.png              # one lossless PNG per key
//! └── …
//! ```
//!
//! File names are the SHA-256 of the key (source path + box), so a key maps to
//! the same file across runs and re-saving a key overwrites its file in place.
//!
//! ## Eviction order
//!
//! Every save stamps the entry with the next value of a persisted, monotonic
//! sequence counter. [`trim`](PersistentStore::trim) removes the lowest
//! sequences first, i.e. the oldest-produced renditions. Wall-clock time is
//! not used, so eviction order is deterministic.
//!
//! A manifest that is missing, corrupt, or from another format version loads
//! as an empty store; orphaned PNGs are overwritten as keys are re-saved.
//!
//! ## Manifest writes
//!
//! Saves write their PNG immediately but only update the in-memory index.
//! The manifest is written by [`trim`](PersistentStore::trim),
//! [`close`](PersistentStore::close), [`DiskStore::flush`] and on drop, so
//! filling a store costs one manifest write rather than one per rendition.
//! A crash before the next write leaves the new PNGs unindexed; they are
//! overwritten when their keys are generated again.

use crate::key::Key;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Name of the manifest file within the store directory.
const MANIFEST_FILENAME: &str = ".store-manifest.json";

/// Version of the manifest format. Bump this to invalidate all existing
/// stores when the format or key hashing changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("store is closed")]
    Closed,
}

/// Durable storage of renditions keyed by [`Key`].
///
/// Implementations must be internally synchronized: the repository calls
/// them concurrently from worker threads.
pub trait PersistentStore: Send + Sync {
    fn save(&self, key: &Key, image: &DynamicImage) -> Result<(), StoreError>;

    fn load(&self, key: &Key) -> Result<Option<DynamicImage>, StoreError>;

    /// Evict oldest-produced entries until at most `max_entries` remain.
    /// Returns the number of entries evicted.
    fn trim(&self, max_entries: usize) -> Result<usize, StoreError>;

    fn close(&self) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single stored rendition.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoreEntry {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    /// File name relative to the store directory.
    pub file: String,
    /// Production sequence number; lower is older.
    pub produced: u64,
}

/// On-disk manifest mapping key digests to entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreManifest {
    pub version: u32,
    pub next_sequence: u64,
    pub entries: HashMap<String, StoreEntry>,
}

impl StoreManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            next_sequence: 0,
            entries: HashMap::new(),
        }
    }

    /// Load from the store directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(dir: &Path) -> Self {
        let content = match std::fs::read_to_string(dir.join(MANIFEST_FILENAME)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Write to the store directory via a temp file + rename, so a crash
    /// mid-write leaves the previous manifest intact.
    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        let path = dir.join(MANIFEST_FILENAME);
        let tmp = dir.join(format!("{MANIFEST_FILENAME}.tmp"));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    /// Record a rendition, stamping it with the next production sequence.
    fn record(&mut self, digest: String, key: &Key, file: String) {
        let produced = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            digest,
            StoreEntry {
                source: key.source().to_path_buf(),
                width: key.width(),
                height: key.height(),
                file,
                produced,
            },
        );
    }

    /// Remove and return the `count` oldest-produced entries.
    fn evict_oldest(&mut self, count: usize) -> Vec<StoreEntry> {
        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(digest, entry)| (entry.produced, digest.clone()))
            .collect();
        by_age.sort();
        by_age
            .into_iter()
            .take(count)
            .filter_map(|(_, digest)| self.entries.remove(&digest))
            .collect()
    }
}

/// SHA-256 of a key, returned as a hex string.
///
/// Inputs: normalized source path and target box. Any change produces a
/// different file.
pub fn hash_key(key: &Key) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"rendition\0");
    hasher.update(key.source().to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(key.width().to_le_bytes());
    hasher.update(key.height().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Directory-backed [`PersistentStore`] writing one PNG per key.
pub struct DiskStore {
    dir: PathBuf,
    state: Mutex<DiskState>,
}

struct DiskState {
    manifest: StoreManifest,
    /// In-memory manifest differs from the one on disk.
    dirty: bool,
    closed: bool,
}

impl DiskState {
    fn flush(&mut self, dir: &Path) -> Result<(), StoreError> {
        if self.dirty {
            self.manifest.save(dir)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let manifest = StoreManifest::load(&dir);
        Ok(Self {
            dir,
            state: Mutex::new(DiskState {
                manifest,
                dirty: false,
                closed: false,
            }),
        })
    }

    /// Write the manifest if saves or evictions changed it since the last write.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.lock()?.flush(&self.dir)
    }

    fn lock(&self) -> Result<MutexGuard<'_, DiskState>, StoreError> {
        // A panic while holding the lock leaves the manifest consistent:
        // it is only mutated after the file operation succeeded.
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }
}

impl PersistentStore for DiskStore {
    fn save(&self, key: &Key, image: &DynamicImage) -> Result<(), StoreError> {
        let digest = hash_key(key);
        let file = format!("{digest}.png");

        // Encode outside the lock so workers of one profile don't queue up
        // behind each other. Only one job per key runs at a time, so no two
        // saves write the same file concurrently.
        drop(self.lock()?);
        image.save_with_format(self.dir.join(&file), ImageFormat::Png)?;

        let mut state = self.lock()?;
        state.manifest.record(digest, key, file);
        state.dirty = true;
        Ok(())
    }

    fn load(&self, key: &Key) -> Result<Option<DynamicImage>, StoreError> {
        let digest = hash_key(key);
        let mut state = self.lock()?;
        let Some(entry) = state.manifest.entries.get(&digest) else {
            return Ok(None);
        };

        let bytes = match std::fs::read(self.dir.join(&entry.file)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // File deleted behind our back: forget the entry
                state.manifest.entries.remove(&digest);
                state.dirty = true;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        drop(state);

        Ok(Some(image::load_from_memory_with_format(
            &bytes,
            ImageFormat::Png,
        )?))
    }

    fn trim(&self, max_entries: usize) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        let excess = state.manifest.entries.len().saturating_sub(max_entries);

        let evicted = state.manifest.evict_oldest(excess);
        for entry in &evicted {
            match std::fs::remove_file(self.dir.join(&entry.file)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %entry.file, error = %e, "failed to delete evicted rendition");
                }
            }
        }
        state.dirty |= !evicted.is_empty();
        state.flush(&self.dir)?;
        Ok(evicted.len())
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.flush(&self.dir)?;
        state.closed = true;
        Ok(())
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .manifest
            .entries
            .len()
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return;
        }
        if let Err(e) = state.flush(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to write store manifest");
        }
    }
}
