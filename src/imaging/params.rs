//! Parameter types for image operations.
//!
//! These structs describe *what* to render, not *how*. They are the interface
//! between the generator (which decides what derivative is needed) and the
//! [`backend`](super::backend) (which does the pixel work), so tests can swap
//! in a mock backend without touching the generation logic.
//!
//! ## Types
//!
//! - [`ResizeFilter`]: Resampling kernel, chosen per profile (fast for previews, sharp for thumbnails).
//! - [`RenderParams`]: Everything one rendition needs: source, target box, orientation handling, filter.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resampling kernel used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Parameters for rendering one derivative image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub source: PathBuf,
    /// Bounding box; the output fits inside it.
    pub width: u32,
    pub height: u32,
    pub apply_orientation: bool,
    pub filter: ResizeFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_default_is_lanczos3() {
        assert_eq!(ResizeFilter::default(), ResizeFilter::Lanczos3);
        assert_eq!(ResizeFilter::default().filter_type(), FilterType::Lanczos3);
    }

    #[test]
    fn filter_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            filter: ResizeFilter,
        }
        let w: Wrapper = toml::from_str(r#"filter = "catmullrom""#).unwrap();
        assert_eq!(w.filter, ResizeFilter::CatmullRom);
    }
}
