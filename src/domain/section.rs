//! Section actions
//!
//! Every eICR section handled by a refinement is assigned exactly one
//! [`SectionAction`]. The map from section code to action is resolved once
//! per refinement plan, before any section is visited.

use super::errors::RefinerError;
use super::ids::SectionCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What to do with one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SectionAction {
    /// Leave the section exactly as it is
    Retain,
    /// Keep only entries that carry a matching code
    #[default]
    Refine,
    /// Replace the section with the minimal placeholder
    Remove,
}

impl SectionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionAction::Retain => "retain",
            SectionAction::Refine => "refine",
            SectionAction::Remove => "remove",
        }
    }
}

impl fmt::Display for SectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionAction {
    type Err = RefinerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retain" | "keep" => Ok(Self::Retain),
            "refine" => Ok(Self::Refine),
            "remove" => Ok(Self::Remove),
            _ => Err(RefinerError::Configuration(format!(
                "Invalid section action: {s}. Expected 'retain', 'refine' or 'remove'"
            ))),
        }
    }
}

/// Explicit per-section actions supplied by configuration or a caller
pub type SectionActions = BTreeMap<SectionCode, SectionAction>;
