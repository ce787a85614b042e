//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Orientation** | `image::ImageDecoder::orientation` (EXIF tag 0x0112) |
//! | **Render** | decode → box-fit resize → rotate/mirror upright |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for box-fit math (unit testable)
//! - **Orientation**: The eight EXIF orientation tags and their pixel transforms
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod orientation;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{calculate_fit_dimensions, oriented_dimensions, plan_fit};
pub use orientation::Orientation;
pub use params::{RenderParams, ResizeFilter};
pub use rust_backend::RustBackend;
