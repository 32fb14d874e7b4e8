//! Crop policy configuration.
//!
//! The widget's policy constants (target aspect, minimum crop size, initial
//! coverage, render debounce, output encoding) live in [`CropPolicy`]. A host
//! can override any of them with an `avatar.toml` placed in its config
//! directory; unspecified keys keep their stock values.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! aspect_ratio = [1, 1]       # width:height of the crop rectangle
//! min_size = 250              # Minimum crop width/height in displayed pixels
//! initial_coverage = 90       # Default crop side as % of the shorter image edge
//! debounce_ms = 500           # Quiet period before a completed crop is rendered
//! device_pixel_ratio = 1.0    # Physical pixels per logical pixel of the output
//!
//! [output]
//! format = "png"              # png | jpeg | webp
//! quality = 90                # JPEG quality (1-100), ignored for lossless formats
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up by [`load_policy`].
pub const CONFIG_FILE: &str = "avatar.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Policy constants for the crop widget.
///
/// All fields have defaults matching the stock avatar picker: a square crop,
/// at least 250×250, starting at 90% of the shorter edge, rendered 500ms after
/// the last completed gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropPolicy {
    /// Aspect ratio as `[width, height]`.
    pub aspect_ratio: [u32; 2],
    /// Minimum crop width and height, in displayed pixels.
    pub min_size: u32,
    /// Initial crop side as a percentage of the shorter displayed edge.
    pub initial_coverage: u32,
    /// Render debounce delay in milliseconds.
    pub debounce_ms: u64,
    /// Device pixel ratio applied when sizing the output surface.
    pub device_pixel_ratio: f64,
    /// Encoding of the emitted payload.
    pub output: OutputConfig,
}

impl Default for CropPolicy {
    fn default() -> Self {
        Self {
            aspect_ratio: [1, 1],
            min_size: 250,
            initial_coverage: 90,
            debounce_ms: 500,
            device_pixel_ratio: 1.0,
            output: OutputConfig::default(),
        }
    }
}

impl CropPolicy {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aspect_ratio[0] == 0 || self.aspect_ratio[1] == 0 {
            return Err(ConfigError::Validation(
                "aspect_ratio values must be non-zero".into(),
            ));
        }
        if self.initial_coverage == 0 || self.initial_coverage > 100 {
            return Err(ConfigError::Validation(
                "initial_coverage must be 1-100".into(),
            ));
        }
        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio <= 0.0 {
            return Err(ConfigError::Validation(
                "device_pixel_ratio must be a positive number".into(),
            ));
        }
        if self.output.quality == 0 || self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }

    /// Target aspect as a single `width / height` factor.
    pub fn aspect(&self) -> f64 {
        self.aspect_ratio[0] as f64 / self.aspect_ratio[1] as f64
    }

    /// Initial coverage as a fraction in `(0, 1]`.
    pub fn coverage_fraction(&self) -> f64 {
        self.initial_coverage as f64 / 100.0
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Output payload encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Lossy quality, only used by JPEG.
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: 90,
        }
    }
}

impl OutputConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default policy as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CropPolicy::default()).expect("default policy must serialize")
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

/// Load `avatar.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `avatar.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_policy(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CropPolicy, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let policy: CropPolicy = merged.try_into()?;
    policy.validate()?;
    Ok(policy)
}

/// Load the policy from `avatar.toml` in `dir`, layered over stock defaults.
pub fn load_policy(dir: &Path) -> Result<CropPolicy, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_policy(base, overlay)
}

/// Returns a fully-commented stock `avatar.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Avatar Crop Configuration
# ========================
#
# Every key is optional. Remove what you don't change; missing keys fall
# back to the values shown here.

# Crop rectangle aspect as [width, height]. Avatars are square.
aspect_ratio = [1, 1]

# Smallest crop the user may select, in displayed pixels. Images whose
# shorter edge is below this value are limited to that edge instead.
min_size = 250

# Side of the initial, centered crop as a percentage of the image's
# shorter edge.
initial_coverage = 90

# Quiet period after the last finished drag before the preview surface is
# re-rendered. Each new drag restarts the delay.
debounce_ms = 500

# Physical pixels per logical pixel. Use 2.0 for high-density displays to
# get a crisp output surface.
device_pixel_ratio = 1.0

[output]
# Encoding of the emitted data URL: "png", "jpeg" or "webp".
# png and webp are lossless.
format = "png"

# JPEG quality 1-100. Ignored for lossless formats.
quality = 90
"##
}
