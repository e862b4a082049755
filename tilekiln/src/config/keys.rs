//! Configuration key access and validation.
//!
//! Type-safe get/set of configuration values by `section.key` name, with
//! per-key value specifications.

use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::file::ConfigFile;
use super::parser::{expand_tilde, parse_bool};
use crate::pipeline::{TileFailurePolicy, MAX_PIXEL_RATIO};
use crate::render::ImageFormat;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
///
/// Each key maps to a specific field in [`ConfigFile`] and knows how to
/// get and set its value with proper validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Render settings
    RenderConcurrency,
    RenderPixelRatio,
    RenderFormat,
    RenderTileSize,
    RenderFailurePolicy,

    // Style settings
    StyleName,
    StyleBasemapProvider,

    // Output settings
    OutputDirectory,
    OutputTempDir,

    // Logging settings
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == lower)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "render.concurrency").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::RenderConcurrency => "render.concurrency",
            ConfigKey::RenderPixelRatio => "render.pixel_ratio",
            ConfigKey::RenderFormat => "render.format",
            ConfigKey::RenderTileSize => "render.tile_size",
            ConfigKey::RenderFailurePolicy => "render.failure_policy",
            ConfigKey::StyleName => "style.name",
            ConfigKey::StyleBasemapProvider => "style.basemap_provider",
            ConfigKey::OutputDirectory => "output.directory",
            ConfigKey::OutputTempDir => "output.temp_dir",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "render").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "concurrency").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::RenderConcurrency => config.render.concurrency.to_string(),
            ConfigKey::RenderPixelRatio => config.render.pixel_ratio.to_string(),
            ConfigKey::RenderFormat => config.render.format.to_string(),
            ConfigKey::RenderTileSize => config.render.tile_size.to_string(),
            ConfigKey::RenderFailurePolicy => config.render.failure_policy.to_string(),
            ConfigKey::StyleName => config.style.name.clone(),
            ConfigKey::StyleBasemapProvider => config.style.basemap_provider.to_string(),
            ConfigKey::OutputDirectory => path_to_display(&config.output.directory),
            ConfigKey::OutputTempDir => path_to_display(&config.output.temp_dir),
            ConfigKey::LoggingFile => path_to_display(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        self.validate(value)?;
        self.apply(config, value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    fn apply(&self, config: &mut ConfigFile, value: &str) -> Result<(), String> {
        match self {
            ConfigKey::RenderConcurrency => {
                config.render.concurrency = value.parse().map_err(|e| format!("{}", e))?;
            }
            ConfigKey::RenderPixelRatio => {
                config.render.pixel_ratio = value.parse().map_err(|e| format!("{}", e))?;
            }
            ConfigKey::RenderFormat => {
                config.render.format = value
                    .parse::<ImageFormat>()
                    .map_err(|e| e.to_string())?;
            }
            ConfigKey::RenderTileSize => {
                config.render.tile_size = value.parse().map_err(|e| format!("{}", e))?;
            }
            ConfigKey::RenderFailurePolicy => {
                config.render.failure_policy = value.parse::<TileFailurePolicy>()?;
            }
            ConfigKey::StyleName => {
                config.style.name = value.to_string();
            }
            ConfigKey::StyleBasemapProvider => {
                config.style.basemap_provider = parse_bool(value);
            }
            ConfigKey::OutputDirectory => {
                config.output.directory = expand_tilde(value);
            }
            ConfigKey::OutputTempDir => {
                config.output.temp_dir = expand_tilde(value);
            }
            ConfigKey::LoggingFile => {
                config.logging.file = expand_tilde(value);
            }
        }
        Ok(())
    }

    /// Validate a value according to this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    /// Get the validation specification for this key.
    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::RenderConcurrency => Box::new(PositiveIntegerSpec),
            ConfigKey::RenderPixelRatio => Box::new(RangeSpec {
                max: MAX_PIXEL_RATIO as f64,
            }),
            ConfigKey::RenderFormat => Box::new(OneOfSpec::new(&["png", "jpg", "jpeg", "webp"])),
            ConfigKey::RenderTileSize => Box::new(PositiveIntegerSpec),
            ConfigKey::RenderFailurePolicy => Box::new(OneOfSpec::new(&["skip", "abort"])),
            ConfigKey::StyleName => Box::new(NonEmptySpec),
            ConfigKey::StyleBasemapProvider => Box::new(BooleanSpec),
            ConfigKey::OutputDirectory => Box::new(NonEmptySpec),
            ConfigKey::OutputTempDir => Box::new(NonEmptySpec),
            ConfigKey::LoggingFile => Box::new(NonEmptySpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::RenderConcurrency,
            ConfigKey::RenderPixelRatio,
            ConfigKey::RenderFormat,
            ConfigKey::RenderTileSize,
            ConfigKey::RenderFailurePolicy,
            ConfigKey::StyleName,
            ConfigKey::StyleBasemapProvider,
            ConfigKey::OutputDirectory,
            ConfigKey::OutputTempDir,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications
// ============================================================================

trait ValueSpecification {
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

/// Value must be one of a fixed set of options (case-insensitive).
struct OneOfSpec {
    options: &'static [&'static str],
}

impl OneOfSpec {
    fn new(options: &'static [&'static str]) -> Self {
        Self { options }
    }
}

impl ValueSpecification for OneOfSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let lower = value.to_lowercase();
        if self.options.iter().any(|opt| *opt == lower) {
            Ok(())
        } else {
            Err(format!("must be one of: {}", self.options.join(", ")))
        }
    }
}

/// Integer greater than zero.
struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

/// Number in `(0, max]`.
struct RangeSpec {
    max: f64,
}

impl ValueSpecification for RangeSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<f64>() {
            Ok(n) if n > 0.0 && n <= self.max => Ok(()),
            _ => Err(format!(
                "must be a number greater than 0 and at most {}",
                self.max
            )),
        }
    }
}

struct BooleanSpec;

impl ValueSpecification for BooleanSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let lower = value.to_lowercase();
        let valid = ["true", "false", "yes", "no", "1", "0", "on", "off"];
        if valid.contains(&lower.as_str()) {
            Ok(())
        } else {
            Err("must be true/false, yes/no, 1/0, or on/off".to_string())
        }
    }
}

struct NonEmptySpec;

impl ValueSpecification for NonEmptySpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err("must not be empty".to_string())
        } else {
            Ok(())
        }
    }
}

/// Convert path to display string, collapsing home dir to ~.
fn path_to_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_key_parsing() {
        assert_eq!(
            "render.concurrency".parse::<ConfigKey>().unwrap(),
            ConfigKey::RenderConcurrency
        );
        // Case insensitive
        assert_eq!(
            "STYLE.NAME".parse::<ConfigKey>().unwrap(),
            ConfigKey::StyleName
        );
        assert!("invalid.key".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_key_name_parts() {
        assert_eq!(ConfigKey::OutputTempDir.section(), "output");
        assert_eq!(ConfigKey::OutputTempDir.key_name(), "temp_dir");
    }

    #[test]
    fn test_get_value() {
        let config = ConfigFile::default();

        assert_eq!(ConfigKey::RenderConcurrency.get(&config), "2");
        assert_eq!(ConfigKey::RenderFormat.get(&config), "png");
        assert_eq!(ConfigKey::RenderFailurePolicy.get(&config), "skip");
        assert_eq!(ConfigKey::StyleBasemapProvider.get(&config), "false");
    }

    #[test]
    fn test_set_value() {
        let mut config = ConfigFile::default();

        ConfigKey::RenderConcurrency.set(&mut config, "8").unwrap();
        assert_eq!(config.render.concurrency, 8);

        ConfigKey::RenderFormat.set(&mut config, "JPEG").unwrap();
        assert_eq!(config.render.format, ImageFormat::Jpg);

        ConfigKey::RenderFailurePolicy.set(&mut config, "abort").unwrap();
        assert_eq!(config.render.failure_policy, TileFailurePolicy::Abort);

        ConfigKey::StyleBasemapProvider
            .set(&mut config, "on")
            .unwrap();
        assert!(config.style.basemap_provider);

        ConfigKey::OutputDirectory
            .set(&mut config, "/srv/tiles")
            .unwrap();
        assert_eq!(config.output.directory, PathBuf::from("/srv/tiles"));
    }

    #[test]
    fn test_set_invalid_value_fails() {
        let mut config = ConfigFile::default();

        assert!(ConfigKey::RenderConcurrency.set(&mut config, "0").is_err());
        assert!(ConfigKey::RenderPixelRatio.set(&mut config, "9").is_err());
        assert!(ConfigKey::RenderFormat.set(&mut config, "gif").is_err());
        assert!(ConfigKey::StyleName.set(&mut config, "  ").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_all_keys_round_trip_names() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert_eq!(ConfigKey::all().len(), 10);
    }
}
