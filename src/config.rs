//! Configuration management for the `TransitRatio` application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TransitRatioError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `TransitRatio` application
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransitRatioConfig {
    /// Maps API (geocoding + directions) configuration
    #[serde(default)]
    pub maps: MapsConfig,
    /// Open-data city list configuration
    #[serde(default)]
    pub open_data: OpenDataConfig,
    /// Travel calculation settings
    #[serde(default)]
    pub travel: TravelConfig,
    /// Map rendering settings
    #[serde(default)]
    pub map: MapConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Default application settings
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Maps API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsConfig {
    /// API key shared by the geocoding and directions endpoints
    pub api_key: Option<String>,
    /// Base URL for the maps API
    #[serde(default = "default_maps_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Open-data (opendatasoft) configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDataConfig {
    #[serde(default = "default_open_data_base_url")]
    pub base_url: String,
    /// Dataset holding cities with population and geopoint
    #[serde(default = "default_cities_dataset")]
    pub cities_dataset: String,
    /// Dataset holding ISO codes and country names
    #[serde(default = "default_countries_dataset")]
    pub countries_dataset: String,
}

/// Travel calculation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelConfig {
    /// Request a transit route next to the driving one
    #[serde(default = "default_include_transit")]
    pub include_transit: bool,
    /// Send destinations as "City, Country" instead of coordinates
    #[serde(default)]
    pub destination_by_name: bool,
}

/// Map rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial Leaflet zoom level
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Default application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Origin address used when none is given
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Percentile of cities to keep when none is given
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Number of rows printed in the summary table
    #[serde(default = "default_top")]
    pub top: usize,
}

// Default value functions
fn default_maps_base_url() -> String {
    "https://maps.googleapis.com".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_open_data_base_url() -> String {
    "https://public.opendatasoft.com".to_string()
}

fn default_cities_dataset() -> String {
    "worldcitiespop".to_string()
}

fn default_countries_dataset() -> String {
    "geonames-country".to_string()
}

fn default_include_transit() -> bool {
    true
}

fn default_zoom() -> u8 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_origin() -> String {
    "Victoria Station, London".to_string()
}

fn default_percentile() -> f64 {
    5.0
}

fn default_top() -> usize {
    5
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_maps_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for OpenDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_open_data_base_url(),
            cities_dataset: default_cities_dataset(),
            countries_dataset: default_countries_dataset(),
        }
    }
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            include_transit: default_include_transit(),
            destination_by_name: false,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            percentile: default_percentile(),
            top: default_top(),
        }
    }
}

impl TransitRatioConfig {
    /// Load configuration from `config_path` (or the default location) and the environment
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // TRANSIT_RATIO_MAPS__API_KEY -> maps.api_key
        builder = builder.add_source(
            Environment::with_prefix("TRANSIT_RATIO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TransitRatioConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("transit-ratio").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.maps.base_url.is_empty() {
            self.maps.base_url = default_maps_base_url();
        }
        if self.maps.timeout_seconds == 0 {
            self.maps.timeout_seconds = default_timeout();
        }
        if self.open_data.base_url.is_empty() {
            self.open_data.base_url = default_open_data_base_url();
        }
        if self.open_data.cities_dataset.is_empty() {
            self.open_data.cities_dataset = default_cities_dataset();
        }
        if self.open_data.countries_dataset.is_empty() {
            self.open_data.countries_dataset = default_countries_dataset();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.defaults.origin.is_empty() {
            self.defaults.origin = default_origin();
        }
        if self.defaults.top == 0 {
            self.defaults.top = default_top();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the shape of the API key, when one is configured.
    ///
    /// A missing key is reported by the session, which needs it, not here.
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.maps.api_key {
            if api_key.trim().is_empty() {
                return Err(TransitRatioError::config(
                    "Maps API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if api_key.len() < 8 {
                return Err(TransitRatioError::config(
                    "Maps API key appears to be invalid (too short). Please check your API key.",
                )
                .into());
            }

            if api_key.len() > 100 {
                return Err(TransitRatioError::config(
                    "Maps API key appears to be invalid (too long). Please check your API key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.maps.timeout_seconds > 300 {
            return Err(
                TransitRatioError::config("Maps API timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.maps.max_retries > 10 {
            return Err(TransitRatioError::config("Maps API max retries cannot exceed 10").into());
        }

        if !(1..=18).contains(&self.map.zoom) {
            return Err(TransitRatioError::config("Map zoom must be between 1 and 18").into());
        }

        if !self.defaults.percentile.is_finite() || !(0.0..=100.0).contains(&self.defaults.percentile)
        {
            return Err(TransitRatioError::config(
                "Default percentile must be between 0 and 100",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TransitRatioError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TransitRatioError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Maps API", &self.maps.base_url),
            ("Open data", &self.open_data.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TransitRatioError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TransitRatioConfig::default();
        assert_eq!(config.maps.base_url, "https://maps.googleapis.com");
        assert_eq!(config.maps.timeout_seconds, 30);
        assert_eq!(config.open_data.cities_dataset, "worldcitiespop");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.map.zoom, 5);
        assert!(config.travel.include_transit);
        assert!(!config.travel.destination_by_name);
        assert!(config.maps.api_key.is_none());
    }

    #[test]
    fn test_config_validation_missing_api_key() {
        let config = TransitRatioConfig::default();
        assert!(config.validate_api_keys().is_ok());
    }

    #[test]
    fn test_config_validation_short_api_key() {
        let mut config = TransitRatioConfig::default();
        config.maps.api_key = Some("abc".to_string());
        let result = config.validate_api_keys();
        assert!(result.unwrap_err().to_string().contains("too short"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TransitRatioConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TransitRatioConfig::default();
        config.maps.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = TransitRatioConfig::default();
        config.map.zoom = 0;
        assert!(config.validate().is_err());

        let mut config = TransitRatioConfig::default();
        config.defaults.percentile = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_base_url() {
        let mut config = TransitRatioConfig::default();
        config.open_data.base_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Open data base URL"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[maps]
api_key = "file_api_key_123"
max_retries = 1

[travel]
destination_by_name = true

[defaults]
origin = "Atocha, Madrid"
percentile = 20.0
"#
        )
        .unwrap();

        let config = TransitRatioConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.maps.api_key.as_deref(), Some("file_api_key_123"));
        assert_eq!(config.maps.max_retries, 1);
        assert_eq!(config.maps.base_url, "https://maps.googleapis.com");
        assert!(config.travel.destination_by_name);
        assert!(config.travel.include_transit);
        assert_eq!(config.defaults.origin, "Atocha, Madrid");
        assert_eq!(config.defaults.percentile, 20.0);
        assert_eq!(config.defaults.top, 5);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = TransitRatioConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("transit-ratio"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
