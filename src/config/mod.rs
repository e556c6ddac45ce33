//! Configuration management
//!
//! TOML configuration with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `REFINER_*` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use eicr_refiner::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("refiner.toml")?;
//! println!("Grouper service: {}", config.terminology.base_url);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [terminology]
//! source = "http"
//! base_url = "https://groupers.example.com/api/v1"
//! api_key = "${REFINER_TERMINOLOGY_TOKEN}"
//!
//! [refinement.sections]
//! "29762-2" = "remove"
//! "11450-4" = "retain"
//!
//! [[refinement.custom_codes]]
//! system = "http://loinc.org"
//! code = "94500-6"
//! ```
//!
//! The section catalog ([`SectionCatalog`]) is separate from the main file:
//! it is either the built-in table or the file named by
//! `refinement.section_catalog`.

pub mod loader;
pub mod schema;
pub mod secret;
pub mod sections;

pub use loader::{load_config, load_config_str, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApplicationConfig, LoggingConfig, RefinementConfig, RefinerConfig, RetryConfig,
    TerminologyConfig, TerminologySource,
};
pub use secret::{secret_string, SecretString, SecretValue};
pub use sections::{SectionCatalog, SectionMetadata};
