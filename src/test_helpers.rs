//! Shared test utilities.
//!
//! Synthetic source images (optionally EXIF-tagged) and a helper for
//! collecting consumer deliveries with a timeout, so a lost notification
//! fails the test instead of hanging it.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::repository::Delivery;

/// How long tests wait for a background delivery before failing.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

// =========================================================================
// Source images
// =========================================================================

/// Raw little-endian TIFF block with a single IFD0 Orientation (SHORT) entry,
/// as embedded by encoders in a JPEG APP1 segment or a PNG `eXIf` chunk.
fn exif_orientation_chunk(tag: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&tag.to_le_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

fn encode_jpeg(width: u32, height: u32, exif: Option<Vec<u8>>) -> Vec<u8> {
    let img = gradient(width, height);
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new(&mut bytes);
    if let Some(exif) = exif {
        encoder.set_exif_metadata(exif).unwrap();
    }
    encoder
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// Write a small valid JPEG with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode_jpeg(width, height, None)).unwrap();
}

/// Write a JPEG carrying an EXIF APP1 segment with the given orientation tag.
pub fn create_test_jpeg_with_orientation(path: &Path, width: u32, height: u32, tag: u16) {
    let bytes = encode_jpeg(width, height, Some(exif_orientation_chunk(tag)));
    std::fs::write(path, bytes).unwrap();
}

/// Write a PNG carrying an `eXIf` chunk with the given orientation tag.
pub fn create_test_png_with_orientation(path: &Path, width: u32, height: u32, tag: u16) {
    let img = gradient(width, height);
    let mut bytes = Vec::new();
    let mut encoder = PngEncoder::new(&mut bytes);
    encoder
        .set_exif_metadata(exif_orientation_chunk(tag))
        .unwrap();
    encoder
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    std::fs::write(path, bytes).unwrap();
}

// =========================================================================
// Deliveries
// =========================================================================

/// Receive exactly `n` deliveries. Panics on timeout.
pub fn recv_n(rx: &Receiver<Delivery>, n: usize) -> Vec<Delivery> {
    (0..n)
        .map(|i| {
            rx.recv_timeout(DELIVERY_TIMEOUT)
                .unwrap_or_else(|e| panic!("delivery {} of {n} never arrived: {e}", i + 1))
        })
        .collect()
}

/// Assert nothing else arrives within a short grace period.
pub fn assert_no_more(rx: &Receiver<Delivery>) {
    if let Ok(extra) = rx.recv_timeout(Duration::from_millis(100)) {
        panic!("unexpected extra delivery for {}", extra.key);
    }
}
