//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{RefinerConfig, TerminologySource};
use super::secret_string;
use crate::domain::errors::RefinerError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "refiner.toml";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into RefinerConfig
/// 4. Applies environment variable overrides (REFINER_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`RefinerError::Configuration`] if the file cannot be read or
/// parsed, a referenced variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use eicr_refiner::config::loader::load_config;
///
/// let config = load_config("refiner.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<RefinerConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(RefinerError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        RefinerError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Same as [`load_config`] for configuration text already in memory
pub fn load_config_str(contents: &str) -> Result<RefinerConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: RefinerConfig = toml::from_str(&contents)
        .map_err(|e| RefinerError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        RefinerError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| RefinerError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&cap[0], &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|m| m == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(RefinerError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RefinerError::Configuration(format!("Invalid value for {name}: '{value}'"))
    })
}

/// Applies environment variable overrides using the REFINER_* prefix
///
/// Variables follow the pattern `REFINER_<SECTION>_<KEY>`, for example
/// `REFINER_TERMINOLOGY_BASE_URL`.
fn apply_env_overrides(config: &mut RefinerConfig) -> Result<()> {
    if let Ok(val) = std::env::var("REFINER_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = std::env::var("REFINER_TERMINOLOGY_SOURCE") {
        config.terminology.source = match val.trim().to_lowercase().as_str() {
            "http" => TerminologySource::Http,
            "file" => TerminologySource::File,
            _ => {
                return Err(RefinerError::Configuration(format!(
                    "Invalid value for REFINER_TERMINOLOGY_SOURCE: '{val}'. Expected 'http' or 'file'"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("REFINER_TERMINOLOGY_BASE_URL") {
        config.terminology.base_url = val;
    }
    if let Ok(val) = std::env::var("REFINER_TERMINOLOGY_API_KEY") {
        config.terminology.api_key = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("REFINER_TERMINOLOGY_TIMEOUT_SECONDS") {
        config.terminology.timeout_seconds =
            parse_override("REFINER_TERMINOLOGY_TIMEOUT_SECONDS", &val)?;
    }
    if let Ok(val) = std::env::var("REFINER_TERMINOLOGY_GROUPERS_FILE") {
        config.terminology.groupers_file = Some(PathBuf::from(val));
    }

    if let Ok(val) = std::env::var("REFINER_REFINEMENT_SECTION_CATALOG") {
        config.refinement.section_catalog = Some(PathBuf::from(val));
    }

    if let Ok(val) = std::env::var("REFINER_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("REFINER_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("REFINER_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("REFINER_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
