//! Core refinement logic.
//!
//! # Modules
//!
//! - [`resolver`] - Condition code-set resolution through a terminology lookup
//! - [`predicate`] - Compiled match predicate over clinical codes
//! - [`section`] - Per-section state transitions and narrative generation
//! - [`reportability`] - Reportable-condition extraction from an RR
//! - [`refine`] - Plans, orchestration and run reports
//!
//! # Refinement Workflow
//!
//! 1. **Resolve**: Look up the grouper of every requested condition
//! 2. **Compile**: Union the codes into a predicate and resolve section actions
//! 3. **Apply**: Parse the eICR and process each planned section
//! 4. **Serialize**: Write the refined eICR and a run report
//!
//! # Example
//!
//! ```rust,no_run
//! use eicr_refiner::config::load_config;
//! use eicr_refiner::core::refine::Refiner;
//! use eicr_refiner::document::Document;
//! use eicr_refiner::domain::ConditionId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("refiner.toml")?;
//! let refiner = Refiner::from_config(&config)?;
//!
//! let document = Document::new(std::fs::read_to_string("eicr.xml")?, None);
//! let covid = ConditionId::new("840539006")?;
//! let refined = refiner
//!     .refine(&document, &config.refinement.sections, &[vec![covid]])
//!     .await?;
//!
//! println!("{}", refined.report_json()?);
//! # Ok(())
//! # }
//! ```

pub mod predicate;
pub mod refine;
pub mod reportability;
pub mod resolver;
pub mod section;
