//! Configuration schema types
//!
//! Every section has serde defaults, so an empty file is a valid
//! configuration that reads groupers over HTTP from `localhost`.

use crate::config::SecretString;
use crate::domain::{Code, SectionActions};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, mapped 1:1 onto the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinerConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Where condition groupers come from
    #[serde(default)]
    pub terminology: TerminologyConfig,

    /// Section actions and custom codes
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RefinerConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value found
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.terminology.validate()?;
        self.refinement.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Terminology backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TerminologySource {
    /// Remote grouper service
    #[default]
    Http,
    /// Local JSON file of grouper records
    File,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("terminology.retry.max_retries must be > 0".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("terminology.retry.backoff_multiplier must be >= 1.0".to_string());
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(
                "terminology.retry.initial_delay_ms cannot exceed max_delay_ms".to_string(),
            );
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Terminology (grouper lookup) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminologyConfig {
    /// `http` or `file`
    #[serde(default)]
    pub source: TerminologySource,

    /// Base URL of the grouper service
    #[serde(default = "default_terminology_url")]
    pub base_url: String,

    /// Bearer token sent to the grouper service
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// JSON file of grouper records (required when `source = "file"`)
    #[serde(default)]
    pub groupers_file: Option<PathBuf>,
}

impl TerminologyConfig {
    fn validate(&self) -> Result<(), String> {
        match self.source {
            TerminologySource::Http => {
                if self.base_url.is_empty() {
                    return Err("terminology.base_url cannot be empty".to_string());
                }
                if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://")
                {
                    return Err(
                        "terminology.base_url must start with http:// or https://".to_string()
                    );
                }
                url::Url::parse(&self.base_url)
                    .map_err(|e| format!("terminology.base_url is not a valid URL: {e}"))?;
                if self
                    .api_key
                    .as_ref()
                    .is_some_and(|key| key.expose_secret().is_empty())
                {
                    return Err("terminology.api_key cannot be empty when set".to_string());
                }
            }
            TerminologySource::File => {
                if self.groupers_file.is_none() {
                    return Err(
                        "terminology.groupers_file is required when source = 'file'".to_string()
                    );
                }
            }
        }

        if self.timeout_seconds == 0 {
            return Err("terminology.timeout_seconds must be > 0".to_string());
        }

        self.retry.validate()
    }
}

impl Default for TerminologyConfig {
    fn default() -> Self {
        Self {
            source: TerminologySource::default(),
            base_url: default_terminology_url(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            retry: RetryConfig::default(),
            groupers_file: None,
        }
    }
}

/// Refinement configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Explicit per-section actions, keyed by section LOINC code
    #[serde(default)]
    pub sections: SectionActions,

    /// Local codes matched in every refinement without a grouper lookup
    #[serde(default)]
    pub custom_codes: Vec<Code>,

    /// TOML file replacing the built-in section catalog
    #[serde(default)]
    pub section_catalog: Option<PathBuf>,
}

impl RefinementConfig {
    fn validate(&self) -> Result<(), String> {
        for (index, code) in self.custom_codes.iter().enumerate() {
            if code.code.trim().is_empty() {
                return Err(format!("refinement.custom_codes[{index}].code cannot be empty"));
            }
            if code.system.trim().is_empty() {
                return Err(format!(
                    "refinement.custom_codes[{index}].system cannot be empty"
                ));
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local JSON file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err(
                "logging.local_path cannot be empty when local logging is enabled".to_string(),
            );
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_terminology_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
