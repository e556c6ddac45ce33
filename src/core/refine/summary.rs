//! Refinement results and reporting

use crate::core::section::{SectionOutcome, SectionProcessing};
use crate::document::EicrVersion;
use crate::domain::{ConditionId, Result, SectionAction, SectionCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Per-section line of a refinement report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    /// LOINC section code
    pub code: SectionCode,

    /// Display name from the section catalog, if the section is catalogued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Action the plan assigned
    pub action: SectionAction,

    #[serde(flatten)]
    pub processing: SectionProcessing,
}

impl SectionReport {
    pub fn outcome(&self) -> SectionOutcome {
        self.processing.outcome
    }
}

/// A refined eICR together with the RR it was paired with
///
/// Serializes to a JSON report; the document bodies themselves are not
/// part of the report.
#[derive(Debug, Clone, Serialize)]
pub struct RefinedDocument {
    /// Unique id of this refinement run
    pub run_id: Uuid,

    /// Conditions whose code sets drove the refinement
    pub conditions: Vec<ConditionId>,

    /// eICR version of the source document
    pub version: EicrVersion,

    /// Sections the plan touched, in document order
    pub sections: Vec<SectionReport>,

    /// Fingerprint of the plan that produced this document
    pub plan_fingerprint: String,

    pub refined_at: DateTime<Utc>,

    /// Refined eICR XML
    #[serde(skip)]
    pub eicr: String,

    /// RR XML, passed through unmodified
    #[serde(skip)]
    pub rr: Option<String>,
}

impl RefinedDocument {
    /// Section report for `code`, if the section was present
    pub fn section(&self, code: &SectionCode) -> Option<&SectionReport> {
        self.sections.iter().find(|s| &s.code == code)
    }

    /// Number of sections that ended with `outcome`
    pub fn count_outcome(&self, outcome: SectionOutcome) -> usize {
        self.sections.iter().filter(|s| s.outcome() == outcome).count()
    }

    pub fn entries_removed(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.processing.entries_before - s.processing.entries_after)
            .sum()
    }

    /// Pretty JSON report of the run
    pub fn report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
