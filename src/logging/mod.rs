//! Logging and observability
//!
//! Structured logging with:
//! - Configurable log levels (overridable through `RUST_LOG`)
//! - Human-readable console output on stderr
//! - Optional JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use eicr_refiner::logging::init_logging;
//! use eicr_refiner::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Refiner started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the outcome of processing one section
///
/// Takes the section code, the action applied and the
/// [`SectionProcessing`](crate::core::section::SectionProcessing) result.
#[macro_export]
macro_rules! log_section_outcome {
    ($code:expr, $action:expr, $processing:expr) => {
        tracing::debug!(
            section = %$code,
            action = %$action,
            outcome = %$processing.outcome,
            entries_before = $processing.entries_before,
            entries_after = $processing.entries_after,
            matched_codes = $processing.matched_codes.len(),
            "Section processed"
        );
    };
}

/// Log the completion of a refinement run
///
/// Takes a [`RefinedDocument`](crate::core::refine::RefinedDocument) and the
/// elapsed [`Duration`](std::time::Duration).
#[macro_export]
macro_rules! log_refinement_complete {
    ($refined:expr, $duration:expr) => {
        tracing::info!(
            run_id = %$refined.run_id,
            version = %$refined.version,
            conditions = $refined.conditions.len(),
            sections = $refined.sections.len(),
            entries_removed = $refined.entries_removed(),
            duration_ms = $duration.as_millis(),
            "Refinement completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use eicr_refiner::log_error_with_context;
/// use eicr_refiner::domain::RefinerError;
///
/// let error = RefinerError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
