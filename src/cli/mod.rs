//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the refiner using clap.

pub mod commands;

use crate::config::{load_config, load_config_str, RefinerConfig, DEFAULT_CONFIG_FILE};
use crate::domain::{RefinerError, Result};
use clap::{Parser, Subcommand};
use std::path::Path;

/// Exit code for configuration errors
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Exit code for unreadable or invalid input documents
pub const EXIT_INPUT_ERROR: i32 = 3;

/// Exit code for everything else
pub const EXIT_FATAL: i32 = 5;

/// eICR Refiner - condition-focused eICR refinement
#[derive(Parser, Debug)]
#[command(name = "eicr-refiner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "REFINER_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "REFINER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine an eICR for one or more conditions
    Refine(commands::refine::RefineArgs),

    /// Print the reportable conditions of an RR as JSON
    Reportability(commands::reportability::ReportabilityArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

/// Maps a refiner error onto the process exit code
pub fn exit_code_for(error: &RefinerError) -> i32 {
    match error {
        RefinerError::Configuration(_) => EXIT_CONFIG_ERROR,
        RefinerError::Io(_) => EXIT_INPUT_ERROR,
        e if e.is_client_error() => EXIT_INPUT_ERROR,
        _ => EXIT_FATAL,
    }
}

/// Loads the configuration file, falling back to defaults when the default
/// file name is absent
///
/// An explicitly named file that does not exist is still an error.
pub fn load_or_default(config_path: &str) -> Result<RefinerConfig> {
    if config_path == DEFAULT_CONFIG_FILE && !Path::new(config_path).exists() {
        tracing::debug!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
        return load_config_str("");
    }
    load_config(config_path)
}
