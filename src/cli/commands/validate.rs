//! Validate config command implementation
//!
//! Loads and validates the configuration file, then loads the section
//! catalog it names so a broken catalog is caught before a refinement run.

use crate::cli::EXIT_CONFIG_ERROR;
use crate::config::{load_config, SectionCatalog, TerminologySource};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        let catalog = match SectionCatalog::from_path_or_builtin(
            config.refinement.section_catalog.as_deref(),
        ) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Section catalog could not be loaded");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        match config.terminology.source {
            TerminologySource::Http => {
                println!("  Terminology: HTTP {}", config.terminology.base_url);
                println!(
                    "  API Key: {}",
                    if config.terminology.api_key.is_some() { "set" } else { "not set" }
                );
                println!("  Timeout: {}s", config.terminology.timeout_seconds);
                println!("  Max Retries: {}", config.terminology.retry.max_retries);
            }
            TerminologySource::File => {
                if let Some(path) = &config.terminology.groupers_file {
                    println!("  Terminology: file {}", path.display());
                }
            }
        }
        match &config.refinement.section_catalog {
            Some(path) => println!(
                "  Section Catalog: {} ({} sections)",
                path.display(),
                catalog.len()
            ),
            None => println!("  Section Catalog: built-in ({} sections)", catalog.len()),
        }
        println!("  Explicit Section Actions: {}", config.refinement.sections.len());
        for (code, action) in &config.refinement.sections {
            println!("    {code} = {action}");
        }
        println!("  Custom Codes: {}", config.refinement.custom_codes.len());
        println!(
            "  File Logging: {}",
            if config.logging.local_enabled {
                config.logging.local_path.as_str()
            } else {
                "disabled"
            }
        );
        println!();

        Ok(0)
    }
}
