//! Derivative profiles.
//!
//! Previews and thumbnails run on the same machinery; a [`Profile`] carries
//! everything that differs between them: the placeholder handed out while a
//! rendition is pending, the resampling filter, whether EXIF orientation is
//! honored, and the size of the worker pool.

use crate::config::{ProfileConfig, effective_threads};
use crate::imaging::ResizeFilter;
use crate::rendition::Rendition;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativeKind {
    Preview,
    Thumbnail,
}

impl DerivativeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub kind: DerivativeKind,
    pub placeholder: Rendition,
    pub apply_orientation: bool,
    pub filter: ResizeFilter,
    /// Worker threads in this profile's generation pool.
    pub workers: usize,
}

impl Profile {
    /// Build a profile from its (already validated) config section.
    pub fn from_config(kind: DerivativeKind, config: &ProfileConfig) -> Self {
        let p = &config.placeholder;
        Self {
            kind,
            placeholder: Rendition::placeholder(p.width, p.height, p.rgba()),
            apply_orientation: config.apply_orientation,
            filter: config.filter,
            workers: effective_threads(config.workers),
        }
    }

    pub fn preview() -> Self {
        Self::from_config(DerivativeKind::Preview, &ProfileConfig::preview())
    }

    pub fn thumbnail() -> Self {
        Self::from_config(DerivativeKind::Thumbnail, &ProfileConfig::thumbnail())
    }
}
