//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate, format sniffed from content |
//! | Orientation | `image::ImageDecoder::orientation` (JPEG/WebP Exif, PNG `eXIf`, TIFF tag) |
//! | Resize | `image::DynamicImage::resize_exact` with the profile's filter |
//! | Rotate / mirror | `image::DynamicImage::{rotate90, rotate180, rotate270, fliph, flipv}` |

use super::backend::{BackendError, ImageBackend};
use super::calculations::plan_fit;
use super::orientation::Orientation;
use super::params::RenderParams;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an in-memory image, guessing the format from its magic bytes.
///
/// The orientation comes from the same decoder, so every format the `image`
/// crate can read metadata from is covered. It is only read when requested;
/// a format without orientation metadata reports [`Orientation::Normal`].
fn decode(
    bytes: &[u8],
    path: &Path,
    read_orientation: bool,
) -> Result<(DynamicImage, Orientation), BackendError> {
    let failed = |e: ImageError| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    };

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()
        .map_err(failed)?;
    let orientation = if read_orientation {
        decoder
            .orientation()
            .map(Orientation::from)
            .unwrap_or_default()
    } else {
        Orientation::Normal
    };
    let img = DynamicImage::from_decoder(decoder).map_err(failed)?;
    Ok((img, orientation))
}

impl ImageBackend for RustBackend {
    fn render(&self, params: &RenderParams) -> Result<DynamicImage, BackendError> {
        let bytes = std::fs::read(&params.source)?;
        let (img, orientation) = decode(&bytes, &params.source, params.apply_orientation)?;

        let (w, h) = plan_fit(
            (img.width(), img.height()),
            orientation,
            params.apply_orientation,
            (params.width, params.height),
        );

        // Resize along the decoded axes first, then turn the (smaller) result upright
        let resized = img.resize_exact(w, h, params.filter.filter_type());
        Ok(orientation.apply(resized))
    }
}
