// eICR Refiner - condition-focused eICR refinement
// Copyright (c) 2025 eICR Refiner Contributors
// Licensed under the MIT License

//! # eICR Refiner
//!
//! Reduces an electronic Initial Case Report (eICR, an HL7 CDA document) to
//! the clinical content relevant to specific reportable conditions, and
//! reads the paired Reportability Response (RR) to find which conditions
//! were determined reportable and for which jurisdictions.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Resolving** condition codes into grouped code sets via a terminology lookup
//! - **Compiling** those codes into a match predicate
//! - **Refining** eICR sections: keep matching entries, regenerate the narrative,
//!   or replace the section with a minimal placeholder
//! - **Extracting** reportable conditions per jurisdiction from an RR
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Refinement logic (resolver, predicate, sections, reportability, orchestration)
//! - [`document`] - Owned XML tree and CDA navigation
//! - [`adapters`] - Terminology lookups (HTTP service, in-memory/JSON file)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management and the section catalog
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eicr_refiner::config::load_config;
//! use eicr_refiner::core::refine::Refiner;
//! use eicr_refiner::document::Document;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("refiner.toml")?;
//!     let refiner = Refiner::from_config(&config)?;
//!
//!     let eicr = std::fs::read_to_string("eicr.xml")?;
//!     let rr = std::fs::read_to_string("rr.xml")?;
//!     let document = Document::new(eicr, Some(rr));
//!
//!     // One refined eICR per condition the RR marks reportable
//!     for refined in refiner.refine_reportable(&document, &config.refinement.sections).await? {
//!         println!("{:?}: {} bytes", refined.conditions, refined.eicr.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Reusing a Plan
//!
//! Resolution happens once per plan; the plan can then refine any number of
//! documents of the same eICR version without further lookups:
//!
//! ```rust,no_run
//! use eicr_refiner::core::refine::{apply_plan, Refiner};
//! use eicr_refiner::document::{Document, EicrVersion};
//! use eicr_refiner::domain::{ConditionId, SectionActions};
//!
//! # async fn example(refiner: Refiner, documents: Vec<Document>) -> Result<(), Box<dyn std::error::Error>> {
//! let covid = ConditionId::new("840539006")?;
//! let plan = refiner
//!     .plan(EicrVersion::V3_1_1, &SectionActions::new(), &[covid])
//!     .await?;
//!
//! for document in &documents {
//!     let refined = apply_plan(document, &plan)?;
//!     println!("{}", refined.report_json()?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::RefinerError`]:
//!
//! ```rust,no_run
//! use eicr_refiner::domain::RefinerError;
//!
//! fn example() -> Result<(), RefinerError> {
//!     let config = eicr_refiner::config::load_config("refiner.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod document;
pub mod domain;
pub mod logging;
