//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers the refiner passes around. Each type
//! keeps condition codes, section codes and jurisdictions from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reportable condition identifier
///
/// The SNOMED CT code of a reportable condition, as found in an RR or
/// supplied by a caller. It is the key used to look up a condition grouper.
///
/// # Examples
///
/// ```
/// use eicr_refiner::domain::ids::ConditionId;
/// use std::str::FromStr;
///
/// let covid = ConditionId::from_str("840539006").unwrap();
/// assert_eq!(covid.as_str(), "840539006");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConditionId(String);

impl ConditionId {
    /// Creates a new ConditionId, trimming surrounding whitespace
    ///
    /// # Returns
    ///
    /// Returns `Ok(ConditionId)` if the code is non-empty, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Condition ID cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the condition code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConditionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ConditionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConditionId> for String {
    fn from(id: ConditionId) -> Self {
        id.0
    }
}

impl AsRef<str> for ConditionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// LOINC section code
///
/// Identifies an eICR section (e.g. `11450-4` for the Problem Section).
/// LOINC codes are digits with a single check-digit suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionCode(String);

impl SectionCode {
    /// Creates a new SectionCode
    ///
    /// # Returns
    ///
    /// Returns `Err` unless the code has the `NNNNN-N` LOINC shape
    pub fn new(code: impl Into<String>) -> Result<Self, String> {
        let code = code.into();
        let code = code.trim();
        let valid = match code.split_once('-') {
            Some((number, check)) => {
                !number.is_empty()
                    && number.chars().all(|c| c.is_ascii_digit())
                    && check.len() == 1
                    && check.chars().all(|c| c.is_ascii_digit())
            }
            None => false,
        };
        if !valid {
            return Err(format!(
                "Invalid LOINC section code '{code}'. Expected format: digits-checkdigit (e.g. 11450-4)"
            ));
        }
        Ok(Self(code.to_string()))
    }

    /// Returns the section code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SectionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SectionCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SectionCode> for String {
    fn from(code: SectionCode) -> Self {
        code.0
    }
}

impl AsRef<str> for SectionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Public health jurisdiction identifier
///
/// Jurisdiction codes are compared case-insensitively; the stored form is
/// upper case so `sddh` and `SDDH` are the same jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JurisdictionId(String);

impl JurisdictionId {
    /// Creates a new, case-normalized JurisdictionId
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Jurisdiction ID cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Returns the normalized jurisdiction code
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw jurisdiction code
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw.trim())
    }
}

impl fmt::Display for JurisdictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JurisdictionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JurisdictionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JurisdictionId> for String {
    fn from(id: JurisdictionId) -> Self {
        id.0
    }
}
