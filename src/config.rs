//! Configuration types for Harvest

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{HarvestError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Body capture settings
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Body fetch retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// HAR output settings
    #[serde(default)]
    pub har: HarConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Response body capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Fetch response bodies out-of-band
    #[serde(default)]
    pub body_capture: bool,
    /// Declared mime types of interest. Informational only, nothing is filtered on it.
    #[serde(default = "default_mime_types")]
    pub captured_mime_types: Vec<String>,
    /// Write the HAR here on stop instead of returning it
    #[serde(default)]
    pub destination_path: Option<PathBuf>,
}

fn default_mime_types() -> Vec<String> {
    vec!["text/html".to_string(), "application/json".to_string()]
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            body_capture: false,
            captured_mime_types: default_mime_types(),
            destination_path: None,
        }
    }
}

impl CaptureConfig {
    /// Apply per-session start options on top of this configuration
    #[must_use]
    pub fn with_start_options(&self, options: &StartOptions) -> Self {
        let mut merged = self.clone();
        if let Some(path) = &options.path {
            merged.destination_path = Some(path.clone());
        }
        if let Some(save_response) = options.save_response {
            merged.body_capture = save_response;
        }
        if let Some(mime_types) = &options.capture_mime_types {
            merged.captured_mime_types = mime_types.clone();
        }
        merged
    }
}

/// What `stop` waits for before finalizing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrainMode {
    /// Wait until each tracked fetch's first attempt has settled
    #[default]
    FirstAttempt,
    /// Wait until each tracked fetch has succeeded or run out of attempts
    Exhausted,
}

/// Body fetch retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Drain policy applied by `stop`
    #[serde(default)]
    pub drain: DrainMode,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            drain: DrainMode::default(),
        }
    }
}

impl RetryConfig {
    /// Delay between attempts
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// HAR output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarConfig {
    /// `log.creator.name` written into documents
    #[serde(default = "default_creator")]
    pub creator_name: String,
}

fn default_creator() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl Default for HarConfig {
    fn default() -> Self {
        Self {
            creator_name: default_creator(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Options accepted by `start`, overriding the `[capture]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    /// Destination path for the HAR document
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Enable response body capture
    #[serde(default)]
    pub save_response: Option<bool>,
    /// Declared mime types of interest
    #[serde(default)]
    pub capture_mime_types: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HarvestError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| HarvestError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(HarvestError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        for (i, mime) in self.capture.captured_mime_types.iter().enumerate() {
            if mime.trim().is_empty() {
                return Err(HarvestError::ConfigError(format!(
                    "capture.captured_mime_types[{i}] cannot be empty"
                )));
            }
        }

        if let Some(path) = &self.capture.destination_path {
            if path.as_os_str().is_empty() {
                return Err(HarvestError::ConfigError(
                    "capture.destination_path cannot be empty".to_string(),
                ));
            }
        }

        if self.har.creator_name.is_empty() {
            return Err(HarvestError::ConfigError(
                "har.creator_name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
