//! Rendered derivative images.
//!
//! A [`Rendition`] is what callers get back: either the real box-fitted image
//! or the profile's placeholder. The pixel buffer sits behind an `Arc`, so
//! handing the same rendition to the memory cache and to every subscriber is
//! a reference-count bump, not a copy.

use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::Arc;

/// Where a rendition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Decoded and resized from the source image.
    Generated,
    /// Read back from the persistent store.
    Restored,
    /// The profile's constant fallback image.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct Rendition {
    image: Arc<DynamicImage>,
    origin: Origin,
}

impl Rendition {
    pub fn generated(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            origin: Origin::Generated,
        }
    }

    pub fn restored(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            origin: Origin::Restored,
        }
    }

    /// Solid-color placeholder of the given size.
    pub fn placeholder(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = RgbaImage::from_pixel(width, height, Rgba(color));
        Self {
            image: Arc::new(DynamicImage::ImageRgba8(pixels)),
            origin: Origin::Placeholder,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == Origin::Placeholder
    }

    /// True when both share the same pixel buffer.
    pub fn same_as(&self, other: &Rendition) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_requested_size_and_color() {
        let p = Rendition::placeholder(4, 3, [10, 20, 30, 255]);
        assert!(p.is_placeholder());
        assert_eq!((p.width(), p.height()), (4, 3));
        assert_eq!(p.image().to_rgba8().get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn clones_share_pixels() {
        let r = Rendition::generated(DynamicImage::new_rgb8(8, 8));
        let c = r.clone();
        assert!(r.same_as(&c));
        assert_eq!(c.origin(), Origin::Generated);
    }

    #[test]
    fn separately_built_renditions_are_not_same() {
        let a = Rendition::generated(DynamicImage::new_rgb8(8, 8));
        let b = Rendition::restored(DynamicImage::new_rgb8(8, 8));
        assert!(!a.same_as(&b));
        assert!(!b.is_placeholder());
    }
}
