//! Engine configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [store]
//! directory = ".derivative-cache"  # Root of the persistent stores
//! max_entries = 5000               # Per-store bound applied at shutdown
//!
//! [preview]
//! # workers = 4                    # Worker threads (omit for auto = CPU cores)
//! apply_orientation = true         # Honor EXIF orientation
//! filter = "triangle"              # nearest | triangle | catmullrom | gaussian | lanczos3
//!
//! [preview.placeholder]
//! width = 320
//! height = 240
//! color = "#2b2b2b"                # #rrggbb or #rrggbbaa
//!
//! [thumbnail]
//! apply_orientation = true
//! filter = "lanczos3"
//!
//! [thumbnail.placeholder]
//! width = 160
//! height = 120
//! color = "#d0d0d0"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::ResizeFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Persistent store settings (location, size bound).
    pub store: StoreConfig,
    /// Preview profile: larger boxes, fast filter.
    pub preview: ProfileConfig,
    /// Thumbnail profile: small boxes, sharp filter.
    pub thumbnail: ProfileConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            preview: ProfileConfig::preview(),
            thumbnail: ProfileConfig::thumbnail(),
        }
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.directory.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.directory must not be empty".into(),
            ));
        }
        if self.store.max_entries == 0 {
            return Err(ConfigError::Validation(
                "store.max_entries must be positive".into(),
            ));
        }
        self.preview.validate("preview")?;
        self.thumbnail.validate("thumbnail")?;
        Ok(())
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory; each profile gets its own subdirectory.
    pub directory: String,
    /// Maximum entries kept per store after the shutdown trim.
    pub max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: ".derivative-cache".to_string(),
            max_entries: 5000,
        }
    }
}

/// Settings for one derivative profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Worker threads. When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Rotate/mirror according to EXIF orientation.
    pub apply_orientation: bool,
    /// Resampling filter used when resizing.
    pub filter: ResizeFilter,
    /// Image returned while the real rendition is pending.
    pub placeholder: PlaceholderConfig,
}

impl ProfileConfig {
    pub fn preview() -> Self {
        Self {
            workers: None,
            apply_orientation: true,
            filter: ResizeFilter::Triangle,
            placeholder: PlaceholderConfig {
                width: 320,
                height: 240,
                color: "#2b2b2b".to_string(),
            },
        }
    }

    pub fn thumbnail() -> Self {
        Self {
            workers: None,
            apply_orientation: true,
            filter: ResizeFilter::Lanczos3,
            placeholder: PlaceholderConfig {
                width: 160,
                height: 120,
                color: "#d0d0d0".to_string(),
            },
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Validation(format!(
                "{section}.workers must be positive"
            )));
        }
        if self.placeholder.width == 0 || self.placeholder.height == 0 {
            return Err(ConfigError::Validation(format!(
                "{section}.placeholder dimensions must be non-zero"
            )));
        }
        parse_hex_color(&self.placeholder.color).map_err(|_| {
            ConfigError::Validation(format!(
                "{section}.placeholder.color must be #rrggbb or #rrggbbaa, got {:?}",
                self.placeholder.color
            ))
        })?;
        Ok(())
    }
}

/// Placeholder image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceholderConfig {
    pub width: u32,
    pub height: u32,
    /// CSS-style hex color, `#rrggbb` or `#rrggbbaa`.
    pub color: String,
}

impl PlaceholderConfig {
    /// The color as RGBA. Invalid colors (rejected by validation) fall back
    /// to opaque mid-gray.
    pub fn rgba(&self) -> [u8; 4] {
        parse_hex_color(&self.color).unwrap_or([128, 128, 128, 255])
    }
}

/// Parse `#rrggbb` / `#rrggbbaa` into RGBA bytes.
pub fn parse_hex_color(value: &str) -> Result<[u8; 4], ConfigError> {
    let invalid = || ConfigError::Validation(format!("invalid color {value:?}"));
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok([channel(0)?, channel(2)?, channel(4)?, alpha])
}

/// Resolve the effective worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(workers: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    workers.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto. It is what lets a
/// partial `[preview]` section keep the preview defaults for the keys it
/// leaves out (rather than some generic profile default).
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EngineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse a config from TOML text, merged over the stock defaults.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let config: EngineConfig = merge_toml(stock_defaults_value(), overlay).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Returns the stock defaults when the file does not exist.
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(EngineConfig::default());
    }
    let content = fs::read_to_string(&config_path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# derivcache configuration
# ========================
# All keys are optional; the values below are the defaults.

[store]
# Root directory of the persistent stores. Previews and thumbnails each get
# a subdirectory.
directory = ".derivative-cache"
# Each store is trimmed to this many renditions at shutdown, oldest first.
max_entries = 5000

[preview]
# Worker threads generating previews. Omit to use every CPU core; larger
# values are clamped to the core count.
# workers = 4
# Rotate/mirror according to the EXIF orientation tag.
apply_orientation = true
# Resampling filter: nearest, triangle, catmullrom, gaussian, lanczos3.
filter = "triangle"

[preview.placeholder]
# Returned immediately while a preview is being generated.
width = 320
height = 240
color = "#2b2b2b"

[thumbnail]
# workers = 4
apply_orientation = true
filter = "lanczos3"

[thumbnail.placeholder]
width = 160
height = 120
color = "#d0d0d0"
"##
}
