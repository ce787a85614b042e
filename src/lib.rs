//! # derivcache
//!
//! A derivative-image cache. Callers ask for a scaled rendition of a source
//! image (a *preview* or a *thumbnail*) and get an answer immediately: the
//! cached rendition if there is one, otherwise a placeholder, followed later
//! by a callback carrying the real thing once a background worker has
//! produced it.
//!
//! # Architecture
//!
//! ```text
//!             get(key, force, consumer)
//!                      │
//!                      ▼
//!   ┌──────────── Repository ─────────────┐
//!   │ memory cache     pending requests   │──── rendition / placeholder
//!   └──────┬───────────────────▲──────────┘
//!          │ job               │ completion
//!          ▼                   │
//!      Generator (worker pool) ─── store read-through / write-through
//!          │                               │
//!          ▼                               ▼
//!      ImageBackend                 PersistentStore
//!   (decode, orient, fit)          (one PNG per key)
//! ```
//!
//! Requests for the same key coalesce: one job runs no matter how many
//! callers are waiting, and each waiting consumer is called exactly once.
//! Failed jobs deliver the profile placeholder so nobody waits forever.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`key`] | Cache key: normalized source path + target box |
//! | [`rendition`] | Shared, immutable decoded bitmaps and where they came from |
//! | [`repository`] | Memory cache, request coalescing, consumer fan-out, statistics |
//! | [`generator`] | Worker pool turning jobs into renditions |
//! | [`store`] | Persistent store trait and the directory-backed implementation |
//! | [`profile`] | Preview and thumbnail profiles (placeholder, filter, workers) |
//! | [`engine`] | Both repositories wired from config, with shutdown trimming |
//! | [`config`] | `config.toml` loading, validation and stock defaults |
//! | [`imaging`] | Image backend: decoding, EXIF orientation, box-fit math |
//!
//! # Design Decisions
//!
//! ## Orientation Before Fit
//!
//! The box fit is computed against the dimensions the image will have
//! *after* EXIF orientation is applied, so a portrait photo stored sideways
//! still fills a landscape box correctly. Resizing happens in decoded pixel
//! space and the rotation last, which keeps the resampling identical for
//! every orientation. See [`imaging::plan_fit`].
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and EXIF orientation all come from the `image`
//! crate, so every format it decodes also has its orientation honored.
//! No system libraries are involved.
//!
//! ## Injected Collaborators
//!
//! [`Repository`] takes its [`PersistentStore`] and [`imaging::ImageBackend`]
//! as trait objects. Tests drive the whole state machine with an in-memory
//! mock backend and a temp-dir store; the [`Engine`] wires the real ones.

pub mod config;
pub mod engine;
pub mod generator;
pub mod imaging;
pub mod key;
pub mod profile;
pub mod rendition;
pub mod repository;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use engine::{Engine, EngineError};
pub use key::Key;
pub use profile::{DerivativeKind, Profile};
pub use rendition::{Origin, Rendition};
pub use repository::{CacheStats, Delivery, Repository, RequestError, channel_consumer};
pub use store::{DiskStore, PersistentStore, StoreError};
