//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the one operation the generator needs:
//! turn a source file into a box-fitted, upright bitmap.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, built on the
//! `image` crate.

use super::params::RenderParams;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Backends are shared across worker threads, hence `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Read and decode the source, read its orientation metadata when
    /// `apply_orientation` is set, and produce the box-fitted image.
    /// Missing or unreadable orientation metadata means no transform.
    fn render(&self, params: &RenderParams) -> Result<DynamicImage, BackendError>;
}
