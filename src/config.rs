//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `snapfit.toml`. Stock defaults are
//! the base layer; a user file overrides only the keys it names.
//!
//! ## Config File Location
//!
//! `snapfit` looks for `snapfit.toml` in the working directory, or loads the
//! file passed with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! max_bytes = 5242880       # Byte budget for normalized output
//! format = "jpeg"           # "jpeg" or "png"
//! initial_quality = 0.9     # First quality tried
//! quality_step = 0.05       # Decrement between attempts
//! min_quality = 0.1         # Lowest quality tried
//! max_attempts = 15         # Cap on quality attempts
//! downscale = true          # Shrink when quality alone is not enough
//! safety_margin = 0.9       # Multiplier on the computed scale factor
//! scale_floor = 0.3         # Smallest acceptable scale factor
//! downscale_quality = 0.7   # Quality used after shrinking
//!
//! [orientation]
//! reencode_quality = 0.92   # Quality for re-encoding rotated images
//!
//! [portrait]
//! min_width = 400
//! min_height = 800
//! preferred_aspect_ratio = 0.75
//! tolerance = 0.05
//! edge_warning = 0.6
//! recommended_width = 600
//! recommended_height = 800
//!
//! [rasterizer]
//! timeout_ms = 10000        # Per decode/draw/encode call, 0 = unbounded
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    CompressionTarget, EncoderSettings, OutputFormat, PipelineOptions, PortraitRequirements,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "snapfit.toml";

/// Budget for a "fit" image sent to the generation API.
pub const FIT_IMAGE_MAX_BYTES: usize = 1024 * 1024;
/// General upload limit.
pub const GENERAL_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `snapfit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Size budget and quality schedule.
    pub compression: CompressionConfig,
    /// Orientation correction settings.
    pub orientation: OrientationConfig,
    /// Portrait validation requirements.
    pub portrait: PortraitRequirements,
    /// Rasterizer call bounds.
    pub rasterizer: RasterizerConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if c.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "compression.max_bytes must be non-zero".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "compression.max_attempts must be at least 1".into(),
            ));
        }
        unit_interval("compression.initial_quality", f64::from(c.initial_quality))?;
        unit_interval("compression.quality_step", f64::from(c.quality_step))?;
        unit_interval("compression.min_quality", f64::from(c.min_quality))?;
        unit_interval("compression.downscale_quality", f64::from(c.downscale_quality))?;
        unit_interval("compression.safety_margin", c.safety_margin)?;
        unit_interval("compression.scale_floor", c.scale_floor)?;
        unit_interval(
            "orientation.reencode_quality",
            f64::from(self.orientation.reencode_quality),
        )?;

        let p = &self.portrait;
        if p.min_width == 0 || p.min_height == 0 {
            return Err(ConfigError::Validation(
                "portrait.min_width and portrait.min_height must be non-zero".into(),
            ));
        }
        if !p.preferred_aspect_ratio.is_finite() || p.preferred_aspect_ratio <= 0.0 {
            return Err(ConfigError::Validation(
                "portrait.preferred_aspect_ratio must be a positive number".into(),
            ));
        }
        if !p.tolerance.is_finite() || p.tolerance < 0.0 {
            return Err(ConfigError::Validation(
                "portrait.tolerance must be a non-negative number".into(),
            ));
        }
        if !p.edge_warning.is_finite() || !(0.0..=1.0).contains(&p.edge_warning) {
            return Err(ConfigError::Validation(
                "portrait.edge_warning must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            settings: self.compression.settings(),
            reencode_quality: self.orientation.reencode_quality,
            timeout: self.rasterizer.timeout(),
        }
    }
}

/// Size budget and the quality/downscale schedule used to meet it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Byte budget for the encoded output.
    pub max_bytes: usize,
    pub format: OutputFormat,
    pub initial_quality: f32,
    pub quality_step: f32,
    pub min_quality: f32,
    pub max_attempts: usize,
    /// Fall back to shrinking the image when quality alone cannot fit.
    pub downscale: bool,
    pub safety_margin: f64,
    /// Smallest linear scale factor accepted before refusing.
    pub scale_floor: f64,
    pub downscale_quality: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let settings = EncoderSettings::default();
        Self {
            max_bytes: GENERAL_MAX_BYTES,
            format: OutputFormat::Jpeg,
            initial_quality: 0.9,
            quality_step: settings.quality_step,
            min_quality: settings.min_quality,
            max_attempts: settings.max_attempts,
            downscale: settings.downscale,
            safety_margin: settings.safety_margin,
            scale_floor: settings.scale_floor,
            downscale_quality: settings.downscale_quality,
        }
    }
}

impl CompressionConfig {
    pub fn target(&self) -> CompressionTarget {
        CompressionTarget::new(self.max_bytes, self.format).with_initial_quality(self.initial_quality)
    }

    pub fn settings(&self) -> EncoderSettings {
        EncoderSettings {
            quality_step: self.quality_step,
            min_quality: self.min_quality,
            max_attempts: self.max_attempts,
            downscale: self.downscale,
            safety_margin: self.safety_margin,
            scale_floor: self.scale_floor,
            downscale_quality: self.downscale_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrientationConfig {
    /// Quality for re-encoding an orientation-corrected image.
    pub reencode_quality: f32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            reencode_quality: 0.92,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterizerConfig {
    /// Limit per rasterizer call in milliseconds; `0` disables it.
    pub timeout_ms: u64,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl RasterizerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel normalization workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
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

/// Read a config file as a raw TOML value.
pub fn read_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load `snapfit.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `snapfit.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    read_config_file(&config_path).map(Some)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `snapfit.toml` in the given directory, or stock defaults.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(dir)?)
}

/// Load config from an explicit file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, Some(read_config_file(path)?))
}

/// Returns a fully-commented stock `snapfit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# snapfit Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Size-bounded encoding
# ---------------------------------------------------------------------------
[compression]
# Byte budget for normalized output (raw encoded bytes, not base64).
# 1048576 suits a "fit" image, 5242880 is the general upload limit.
max_bytes = 5242880

# Output container: "jpeg" or "png".
format = "jpeg"

# Quality schedule: start at initial_quality and step down by quality_step
# until the output fits, stopping at min_quality or after max_attempts.
initial_quality = 0.9
quality_step = 0.05
min_quality = 0.1
max_attempts = 15

# When no quality fits, shrink by sqrt(max_bytes / size) * safety_margin
# and encode once more at downscale_quality. Scale factors below
# scale_floor are refused instead of producing a tiny image.
downscale = true
safety_margin = 0.9
scale_floor = 0.3
downscale_quality = 0.7

# ---------------------------------------------------------------------------
# Orientation correction
# ---------------------------------------------------------------------------
[orientation]
# Quality used when re-encoding an image rotated to match its EXIF tag.
reencode_quality = 0.92

# ---------------------------------------------------------------------------
# Portrait validation
# ---------------------------------------------------------------------------
[portrait]
# Hard resolution floor, in pixels.
min_width = 400
min_height = 800

# Target width/height ratio (0.75 = 3:4) and allowed absolute deviation.
preferred_aspect_ratio = 0.75
tolerance = 0.05

# Warn when the deviation exceeds this fraction of the tolerance.
edge_warning = 0.6

# Warn (without failing) below this resolution.
recommended_width = 600
recommended_height = 800

# ---------------------------------------------------------------------------
# Rasterizer
# ---------------------------------------------------------------------------
[rasterizer]
# Limit for each decode, draw, and encode call in milliseconds. 0 = none.
timeout_ms = 10000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel normalization workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_compression_settings() {
        let config = PipelineConfig::default();
        assert_eq!(config.compression.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.compression.format, OutputFormat::Jpeg);
        assert_eq!(config.compression.initial_quality, 0.9);
        assert_eq!(config.compression.max_attempts, 15);
        assert_eq!(config.compression.scale_floor, 0.3);
    }

    #[test]
    fn default_config_has_portrait_requirements() {
        let config = PipelineConfig::default();
        assert_eq!(config.portrait.min_width, 400);
        assert_eq!(config.portrait.min_height, 800);
        assert_eq!(config.portrait.preferred_aspect_ratio, 0.75);
        assert_eq!(config.portrait.tolerance, 0.05);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[compression]
max_bytes = 1048576
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        // Overridden value
        assert_eq!(config.compression.max_bytes, FIT_IMAGE_MAX_BYTES);
        // Default values preserved
        assert_eq!(config.compression.min_quality, 0.1);
        assert_eq!(config.orientation.reencode_quality, 0.92);
    }

    #[test]
    fn parse_format() {
        let toml = r#"
[compression]
format = "png"
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.compression.format, OutputFormat::Png);

        let bad = r#"
[compression]
format = "webp"
"#;
        assert!(toml::from_str::<PipelineConfig>(bad).is_err());
    }

    #[test]
    fn compression_config_builds_target_and_settings() {
        let mut config = CompressionConfig::default();
        config.max_bytes = 1234;
        config.initial_quality = 0.8;
        config.scale_floor = 0.5;

        let target = config.target();
        assert_eq!(target.max_bytes, 1234);
        assert_eq!(target.initial_quality, 0.8);
        assert_eq!(config.settings().scale_floor, 0.5);
    }

    #[test]
    fn pipeline_options_follow_config() {
        let mut config = PipelineConfig::default();
        config.orientation.reencode_quality = 0.8;
        config.rasterizer.timeout_ms = 250;
        let options = config.pipeline_options();
        assert_eq!(options.reencode_quality, 0.8);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.settings, EncoderSettings::default());
    }

    #[test]
    fn zero_timeout_disables_bound() {
        let config = RasterizerConfig { timeout_ms: 0 };
        assert_eq!(config.timeout(), None);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[compression]
max_bytes = 200000
downscale = false

[portrait]
min_width = 600
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.compression.max_bytes, 200_000);
        assert!(!config.compression.downscale);
        assert_eq!(config.portrait.min_width, 600);
        // Unspecified values should be defaults
        assert_eq!(config.portrait.min_height, 800);
        assert_eq!(config.rasterizer.timeout_ms, 10_000);
    }

    #[test]
    fn load_config_file_reads_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[rasterizer]\ntimeout_ms = 500\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.rasterizer.timeout_ms, 500);
    }

    #[test]
    fn load_config_file_missing_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // effective_threads tests
    // =========================================================================

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn parse_processing_config() {
        let toml = r#"
[processing]
max_processes = 4
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.processing.max_processes, Some(4));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"max_bytes = 100"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"max_bytes = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("max_bytes").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[compression]
max_bytes = 100
format = "jpeg"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[compression]
max_bytes = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let compression = merged.get("compression").unwrap();
        assert_eq!(compression.get("max_bytes").unwrap().as_integer(), Some(70));
        // format preserved from base
        assert_eq!(compression.get("format").unwrap().as_str(), Some("jpeg"));
    }

    #[test]
    fn merge_toml_three_layers() {
        let stock = stock_defaults_value().unwrap();
        let team: toml::Value = toml::from_str("[portrait]\nmin_width = 500\n").unwrap();
        let user: toml::Value = toml::from_str("[portrait]\nmin_height = 900\n").unwrap();

        let merged = merge_toml(merge_toml(stock, team), user);
        let config: PipelineConfig = merged.try_into().unwrap();
        assert_eq!(config.portrait.min_width, 500);
        assert_eq!(config.portrait.min_height, 900);
        assert_eq!(config.portrait.tolerance, 0.05);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[compression]
max_byte = 90
"#;
        let result: Result<PipelineConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml_str = r#"
[compresion]
max_bytes = 90
"#;
        let result: Result<PipelineConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[portrait]\nmin_widht = 400\n",
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = PipelineConfig::default();
        config.compression.initial_quality = 1.0;
        assert!(config.validate().is_ok());

        config.compression.initial_quality = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("initial_quality"));

        config.compression.initial_quality = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_budget() {
        let mut config = PipelineConfig::default();
        config.compression.max_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_scale_floor_range() {
        let mut config = PipelineConfig::default();
        config.compression.scale_floor = 0.0;
        assert!(config.validate().is_err());
        config.compression.scale_floor = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_portrait_values() {
        let mut config = PipelineConfig::default();
        config.portrait.min_width = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.portrait.tolerance = -0.1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.portrait.edge_warning = 2.0;
        assert!(config.validate().is_err());

        for bad in [f64::NAN, f64::INFINITY] {
            let mut config = PipelineConfig::default();
            config.portrait.preferred_aspect_ratio = bad;
            assert!(config.validate().is_err(), "ratio {bad}");

            let mut config = PipelineConfig::default();
            config.portrait.tolerance = bad;
            assert!(config.validate().is_err(), "tolerance {bad}");

            let mut config = PipelineConfig::default();
            config.portrait.edge_warning = bad;
            assert!(config.validate().is_err(), "edge_warning {bad}");
        }
    }

    #[test]
    fn load_config_rejects_nan_portrait_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[portrait]\npreferred_aspect_ratio = nan\ntolerance = nan\n",
        )
        .unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[compression]\nmax_attempts = 0\n",
        )
        .unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // resolve_config / load_raw_config tests
    // =========================================================================

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn load_raw_config_returns_value_when_file_exists() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[orientation]\nreencode_quality = 0.85\n",
        )
        .unwrap();

        let val = load_raw_config(tmp.path()).unwrap().unwrap();
        assert_eq!(
            val.get("orientation")
                .unwrap()
                .get("reencode_quality")
                .unwrap()
                .as_float(),
            Some(0.85)
        );
    }

    #[test]
    fn resolve_config_with_no_overlay() {
        let config = resolve_config(stock_defaults_value().unwrap(), None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[compression]\nsafety_margin = 3.0\n").unwrap();
        let result = resolve_config(stock_defaults_value().unwrap(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[compression]",
            "[orientation]",
            "[portrait]",
            "[rasterizer]",
            "[processing]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        for key in ["compression", "orientation", "portrait", "rasterizer", "processing"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
