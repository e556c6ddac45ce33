//! Init command implementation
//!
//! This module implements the `init` command for generating a commented
//! default configuration file.

use crate::cli::{EXIT_CONFIG_ERROR, EXIT_FATAL};
use crate::config::DEFAULT_CONFIG_FILE;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG_ERROR);
        }

        match fs::write(&self.output, Self::generate_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Point [terminology] at your grouper service or a groupers JSON file");
                println!("  2. Set REFINER_TERMINOLOGY_API_KEY in .env if the service needs one");
                println!("  3. Validate configuration: eicr-refiner validate-config");
                println!("  4. Refine: eicr-refiner refine --eicr eicr.xml --condition 840539006");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(EXIT_FATAL)
            }
        }
    }

    /// Commented default configuration
    fn generate_config() -> String {
        r#"# eICR Refiner Configuration File

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Terminology (condition groupers)
# ============================================================================
[terminology]
# Where groupers come from: "http" (grouper service) or "file" (JSON records)
source = "http"

# Base URL of the grouper service; groupers are read from {base_url}/groupers/{condition}
base_url = "http://localhost:8080/api/v1"

# Bearer token for the grouper service (use an environment variable)
# api_key = "${REFINER_TERMINOLOGY_API_KEY}"

# Request timeout in seconds
timeout_seconds = 30

# JSON file of grouper records, used when source = "file"
# groupers_file = "groupers.json"

[terminology.retry]
# Maximum attempts for connection failures, 429 and 5xx responses
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 5000
backoff_multiplier = 2.0

# ============================================================================
# Refinement
# ============================================================================
[refinement]
# Optional TOML file replacing the built-in section catalog
# section_catalog = "sections.toml"

# Codes added to every refinement without a terminology lookup
# [[refinement.custom_codes]]
# system = "LOINC"
# code = "94500-6"
# display = "SARS-CoV-2 RNA NAA+probe Ql (Resp)"

# Per-section actions keyed by section LOINC code: retain | refine | remove
# Catalogued sections not listed here are refined.
[refinement.sections]
# "29762-2" = "remove"   # Social History
# "11450-4" = "retain"   # Problems

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON file logging in addition to console output
local_enabled = false
local_path = "./logs"

# Log rotation (daily, hourly, never)
local_rotation = "daily"
"#
        .to_string()
    }
}
