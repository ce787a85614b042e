//! Request identity.
//!
//! A [`Key`] is the unit of caching and coalescing: two requests for the same
//! source path and the same target box are the same request, no matter which
//! caller made them. Paths are made absolute and lexically normalized on
//! construction so `photos/./a.jpg` and `/home/me/photos/a.jpg` collide.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("target box must be positive, got {width}x{height}")]
    EmptyBox { width: u32, height: u32 },
    #[error("source path is empty")]
    EmptyPath,
}

/// Source path plus target bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    source: PathBuf,
    width: u32,
    height: u32,
}

impl Key {
    /// Build a key. The path is normalized but not checked for existence:
    /// the source only has to be readable when the job runs.
    pub fn new(source: impl AsRef<Path>, width: u32, height: u32) -> Self {
        Self {
            source: normalize(source.as_ref()),
            width,
            height,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reject keys that can never produce a rendition.
    pub fn validate(&self) -> Result<(), KeyError> {
        if self.width == 0 || self.height == 0 {
            return Err(KeyError::EmptyBox {
                width: self.width,
                height: self.height,
            });
        }
        if self.source.as_os_str().is_empty() {
            return Err(KeyError::EmptyPath);
        }
        Ok(())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}x{}",
            self.source.display(),
            self.width,
            self.height
        )
    }
}

/// Make `path` absolute and drop `.` / `..` components without touching the
/// filesystem (symlinks are left alone).
fn normalize(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return PathBuf::new();
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
