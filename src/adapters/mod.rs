//! External system integrations
//!
//! - [`terminology`] - condition grouper lookup (HTTP service or local file)
//!
//! Adapters sit behind traits so the refinement core can be driven by an
//! in-memory implementation in tests:
//!
//! ```rust,no_run
//! use eicr_refiner::adapters::terminology::create_terminology;
//! use eicr_refiner::config::TerminologyConfig;
//!
//! # fn example() -> eicr_refiner::domain::Result<()> {
//! let lookup = create_terminology(&TerminologyConfig::default())?;
//! println!("Using {} terminology", lookup.name());
//! # Ok(())
//! # }
//! ```

pub mod terminology;
