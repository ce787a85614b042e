//! The two stock repositories, wired from configuration.
//!
//! An [`Engine`] owns one [`Repository`] per [`DerivativeKind`], each with its
//! own worker pool and its own [`DiskStore`] under the configured store
//! directory:
//!
//! ```text
//! <store.directory>/
//! ├── preview/
//! │   ├── .store-manifest.json
//! │   └── <sha256>.png ...
//! └── thumbnail/
//!     ├── .store-manifest.json
//!     └── <sha256>.png ...
//! ```
//!
//! [`Engine::shutdown`] trims each store to `store.max_entries` and closes it.

use crate::config::EngineConfig;
use crate::imaging::ImageBackend;
use crate::profile::{DerivativeKind, Profile};
use crate::repository::{Repository, RepositoryError};
use crate::store::{DiskStore, PersistentStore, StoreError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct Engine {
    preview: Repository,
    thumbnail: Repository,
    store_dir: PathBuf,
    max_entries: usize,
}

impl Engine {
    /// Open both stores and start both worker pools.
    pub fn open(config: &EngineConfig, backend: Arc<dyn ImageBackend>) -> Result<Self, EngineError> {
        let store_dir = PathBuf::from(&config.store.directory);
        let preview = open_repository(
            &store_dir,
            Profile::from_config(DerivativeKind::Preview, &config.preview),
            Arc::clone(&backend),
        )?;
        let thumbnail = open_repository(
            &store_dir,
            Profile::from_config(DerivativeKind::Thumbnail, &config.thumbnail),
            backend,
        )?;
        info!(store = %store_dir.display(), "engine opened");
        Ok(Self {
            preview,
            thumbnail,
            store_dir,
            max_entries: config.store.max_entries,
        })
    }

    pub fn repository(&self, kind: DerivativeKind) -> &Repository {
        match kind {
            DerivativeKind::Preview => &self.preview,
            DerivativeKind::Thumbnail => &self.thumbnail,
        }
    }

    pub fn preview(&self) -> &Repository {
        &self.preview
    }

    pub fn thumbnail(&self) -> &Repository {
        &self.thumbnail
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Trim both stores to the configured bound and close them. Jobs still in
    /// flight finish and notify their subscribers, but are not persisted.
    ///
    /// Every store is trimmed and closed even when an earlier step fails;
    /// the first error is returned.
    pub fn shutdown(self) -> Result<(), EngineError> {
        let mut first_error: Option<EngineError> = None;
        let mut evicted = 0;
        for repo in [&self.preview, &self.thumbnail] {
            match repo.trim(self.max_entries) {
                Ok(n) => evicted += n,
                Err(e) => {
                    warn!(kind = %repo.kind(), error = %e, "trim failed during shutdown");
                    first_error.get_or_insert(e.into());
                }
            }
            if let Err(e) = repo.close() {
                warn!(kind = %repo.kind(), error = %e, "close failed during shutdown");
                first_error.get_or_insert(e.into());
            }
        }
        info!(
            evicted,
            max_entries = self.max_entries,
            preview = %self.preview.stats(),
            thumbnail = %self.thumbnail.stats(),
            "engine shut down"
        );
        first_error.map_or(Ok(()), Err)
    }
}

fn open_repository(
    store_dir: &Path,
    profile: Profile,
    backend: Arc<dyn ImageBackend>,
) -> Result<Repository, EngineError> {
    let store: Arc<dyn PersistentStore> =
        Arc::new(DiskStore::open(store_dir.join(profile.kind.as_str()))?);
    Ok(Repository::new(profile, store, backend)?)
}
