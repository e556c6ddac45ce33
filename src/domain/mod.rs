//! Domain models and types for the refiner.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ConditionId`], [`SectionCode`], [`JurisdictionId`])
//! - **Clinical codes** ([`Code`], [`CodeSystem`])
//! - **Section actions** ([`SectionAction`], [`SectionActions`])
//! - **Reportability results** ([`ReportableCondition`], [`JurisdictionReportableConditions`])
//! - **Error types** ([`RefinerError`], [`LookupError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern so a condition code can never be
//! passed where a section code is expected:
//!
//! ```rust
//! use eicr_refiner::domain::{ConditionId, SectionCode};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let condition = ConditionId::new("840539006")?;
//! let section = SectionCode::new("11450-4")?;
//!
//! // This won't compile
//! // let wrong: SectionCode = condition;
//! # Ok(())
//! # }
//! ```

pub mod code;
pub mod errors;
pub mod ids;
pub mod reportability;
pub mod result;
pub mod section;

// Re-export commonly used types for convenience
pub use code::{Code, CodeSystem};
pub use errors::{LookupError, RefinerError};
pub use ids::{ConditionId, JurisdictionId, SectionCode};
pub use reportability::{JurisdictionReportableConditions, ReportableCondition};
pub use result::Result;
pub use section::{SectionAction, SectionActions};
