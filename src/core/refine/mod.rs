//! Refinement orchestration and reporting
//!
//! This module provides the refinement entry points:
//! - Plan compilation and application
//! - The [`Refiner`] service (explicit, per-condition and RR-driven runs)
//! - Per-section and per-run reports

pub mod plan;
pub mod refiner;
pub mod summary;

pub use plan::{apply_plan, PlannedSection, RefinementPlan};
pub use refiner::Refiner;
pub use summary::{RefinedDocument, SectionReport};
