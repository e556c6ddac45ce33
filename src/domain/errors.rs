//! Domain error types
//!
//! This module defines the error hierarchy for the refiner.
//! All errors are domain-specific and don't expose third-party parser or HTTP types.

use thiserror::Error;

/// Main refiner error type
///
/// This is the primary error type used throughout the library. Parser and
/// terminology failures are converted into named kinds before they leave
/// the module that produced them.
#[derive(Debug, Error)]
pub enum RefinerError {
    /// Empty or malformed XML input
    #[error("Document parse error: {message}{}", location(.line, .column))]
    DocumentParse {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
    },

    /// A structurally mandatory element is missing
    #[error("Structure error: {0}")]
    Structure(String),

    /// Whole-document refinement was requested without any condition codes
    #[error("Condition codes required: at least one non-empty condition code set must be supplied")]
    ConditionCodeRequired,

    /// The eICR does not declare a supported implementation guide version
    #[error("Unsupported eICR version: {0}")]
    UnsupportedVersion(String),

    /// The terminology capability could not be used at all
    #[error("Terminology lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// A compiled predicate was malformed or failed to evaluate
    #[error("Query evaluation error: {0}")]
    QueryEvaluation(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

fn location(line: &Option<u32>, column: &Option<u32>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

impl RefinerError {
    /// Creates a parse error without position information
    pub fn parse(message: impl Into<String>) -> Self {
        RefinerError::DocumentParse {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Whether the error was caused by the caller's input rather than the service
    ///
    /// An outer web layer maps these to a bad-request response.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RefinerError::DocumentParse { .. }
                | RefinerError::Structure(_)
                | RefinerError::ConditionCodeRequired
                | RefinerError::UnsupportedVersion(_)
        )
    }
}

/// Terminology lookup errors
///
/// Errors that occur while fetching a condition grouper. Only
/// [`LookupError::Unavailable`] is allowed to escape the code-set resolver;
/// the others are recovered per condition code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// No grouper exists for the condition
    #[error("Grouper not found for condition: {0}")]
    NotFound(String),

    /// Network failure or server error while looking up a single condition
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The lookup answered with something that is not a grouper record
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The capability is unusable (rejected credentials, not configured)
    #[error("Terminology service unavailable: {0}")]
    Unavailable(String),
}

impl LookupError {
    /// Whether the resolver may log and skip this failure
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LookupError::Unavailable(_))
    }
}

impl From<std::io::Error> for RefinerError {
    fn from(err: std::io::Error) -> Self {
        RefinerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RefinerError {
    fn from(err: serde_json::Error) -> Self {
        RefinerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RefinerError {
    fn from(err: toml::de::Error) -> Self {
        RefinerError::Configuration(format!("TOML parse error: {err}"))
    }
}
