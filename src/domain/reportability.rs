//! Reportability result types
//!
//! These are the values produced by RR extraction. They are built fresh per
//! extraction and not mutated afterwards.

use super::ids::JurisdictionId;
use serde::{Deserialize, Serialize};

/// A condition the RR marks as reportable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportableCondition {
    /// SNOMED CT code of the condition
    pub code: String,

    /// Display name from the RR (or a fixed placeholder)
    pub display_name: String,
}

impl ReportableCondition {
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
        }
    }
}

/// The reportable conditions routed to one jurisdiction
///
/// Conditions are unique by code and kept in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionReportableConditions {
    pub jurisdiction: JurisdictionId,
    pub conditions: Vec<ReportableCondition>,
}

impl JurisdictionReportableConditions {
    pub fn new(jurisdiction: JurisdictionId) -> Self {
        Self {
            jurisdiction,
            conditions: Vec::new(),
        }
    }

    /// Adds a condition unless one with the same code is already present
    ///
    /// Returns `true` when the condition was added.
    pub fn push_unique(&mut self, condition: ReportableCondition) -> bool {
        if self.conditions.iter().any(|c| c.code == condition.code) {
            return false;
        }
        self.conditions.push(condition);
        true
    }
}
