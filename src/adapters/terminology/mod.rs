//! Terminology (condition grouper) adapters
//!
//! The [`TerminologyLookup`] trait is the refiner's only view of the outside
//! world. Two implementations ship with the crate:
//!
//! - [`HttpTerminologyClient`] - remote grouper service
//! - [`InMemoryTerminology`] - map or JSON file of grouper records

pub mod http;
pub mod lookup;
pub mod memory;

pub use http::HttpTerminologyClient;
pub use lookup::{decode_codes, GrouperRecord, TerminologyLookup};
pub use memory::InMemoryTerminology;

use crate::config::{TerminologyConfig, TerminologySource};
use crate::domain::{RefinerError, Result};
use std::sync::Arc;

/// Creates the lookup selected by `terminology.source`
///
/// # Errors
///
/// Returns [`RefinerError::Configuration`] when the selected backend cannot
/// be initialised.
pub fn create_terminology(config: &TerminologyConfig) -> Result<Arc<dyn TerminologyLookup>> {
    let lookup: Arc<dyn TerminologyLookup> = match config.source {
        TerminologySource::Http => Arc::new(HttpTerminologyClient::new(config)?),
        TerminologySource::File => {
            let path = config.groupers_file.as_ref().ok_or_else(|| {
                RefinerError::Configuration(
                    "terminology.groupers_file is required when source = 'file'".to_string(),
                )
            })?;
            Arc::new(InMemoryTerminology::load(path)?)
        }
    };

    tracing::info!(source = lookup.name(), "Terminology lookup ready");
    Ok(lookup)
}
