//! Configuration management for scour.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults; a missing file is not an error. All sections implement
//! `Default` and deserialize with `#[serde(default)]`, so partial files are
//! fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{CleanMode, CleanOptions, TargetFormat};

/// Root configuration structure for scour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default cleaning behavior
    pub cleaning: CleaningConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Defaults for how images get cleaned; CLI flags override per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// "strip" or "reencode"
    pub mode: CleanMode,

    /// Output format when re-encoding
    pub target_format: TargetFormat,

    /// JPEG encode quality in [0.0, 1.0]
    pub quality: f32,

    /// Prefer lossless encoding where the target supports it
    pub lossless: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            mode: CleanMode::Strip,
            target_format: TargetFormat::Png,
            quality: 0.92,
            lossless: false,
        }
    }
}

impl CleaningConfig {
    /// Per-call options seeded from these defaults.
    pub fn to_options(&self) -> CleanOptions {
        CleanOptions {
            mode: self.mode,
            target_format: self.target_format,
            quality: self.quality,
            lossless: self.lossless,
        }
    }
}

/// Resource limits protecting against oversized or hostile inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum input file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum width or height in pixels
    pub max_image_dimension: u32,

    /// Timeout for one decode+encode pass in milliseconds
    pub reencode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 20_000,
            reencode_timeout_ms: 30_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Output format: pretty or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/rs.scour.scour/config.toml
    /// - Linux: ~/.config/scour/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\scour\config\config.toml
    ///
    /// Falls back to ~/.scour/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("rs", "scour", "scour")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".scour").join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.cleaning.quality) {
            return Err(ConfigError::ValidationError(
                "cleaning.quality must be between 0.0 and 1.0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.reencode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.reencode_timeout_ms must be > 0".into(),
            ));
        }
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of trace/debug/info/warn/error, got '{}'",
                self.logging.level
            )));
        }
        if !["pretty", "json"].contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_file_size_mb, 100);
        assert_eq!(config.limits.max_image_dimension, 20_000);
        assert_eq!(config.cleaning.mode, CleanMode::Strip);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[cleaning]"));
        assert!(toml.contains("[limits]"));
        assert!(toml.contains("[logging]"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[cleaning]\nmode = \"reencode\"\n").unwrap();
        assert_eq!(config.cleaning.mode, CleanMode::Reencode);
        assert_eq!(config.cleaning.target_format, TargetFormat::Png);
        assert_eq!(config.limits.max_file_size_mb, 100);
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        let mut config = Config::default();
        config.cleaning.quality = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality"));

        config.cleaning.quality = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.limits.max_file_size_mb = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_file_size_mb"));

        let mut config = Config::default();
        config.limits.reencode_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reencode_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_unknown_logging_values() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.cleaning.quality = 0.8;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!((loaded.cleaning.quality - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[limits]\nmax_file_size_mb = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_cleaning_config_to_options() {
        let cleaning = CleaningConfig {
            mode: CleanMode::Reencode,
            target_format: TargetFormat::Jpeg,
            ..CleaningConfig::default()
        };
        let opts = cleaning.to_options();
        assert_eq!(opts.mode, CleanMode::Reencode);
        assert_eq!(opts.target_format, TargetFormat::Jpeg);
    }
}
