//! Result type alias for the refiner
//!
//! This module provides a convenient Result type alias that uses RefinerError
//! as the error type.

use super::errors::RefinerError;

/// Result type alias for refiner operations
///
/// # Examples
///
/// ```
/// use eicr_refiner::domain::result::Result;
/// use eicr_refiner::domain::errors::RefinerError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(RefinerError::Structure("no structuredBody".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, RefinerError>;
