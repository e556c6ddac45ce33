//! Clinical code model
//!
//! A [`Code`] is a (system, code, display) triple. Identity is the
//! (system, code) pair; the display text is informational only.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The terminology systems a condition grouper aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSystem {
    Loinc,
    Snomed,
    Icd10,
    RxNorm,
}

impl CodeSystem {
    /// Every grouper system, in aggregation order
    pub const ALL: [CodeSystem; 4] = [
        CodeSystem::Loinc,
        CodeSystem::Snomed,
        CodeSystem::Icd10,
        CodeSystem::RxNorm,
    ];

    /// Canonical system URI
    pub fn uri(&self) -> &'static str {
        match self {
            CodeSystem::Loinc => "http://loinc.org",
            CodeSystem::Snomed => "http://snomed.info/sct",
            CodeSystem::Icd10 => "http://hl7.org/fhir/sid/icd-10-cm",
            CodeSystem::RxNorm => "http://www.nlm.nih.gov/research/umls/rxnorm",
        }
    }

    /// HL7 v3 OID used in CDA `codeSystem` attributes
    pub fn oid(&self) -> &'static str {
        match self {
            CodeSystem::Loinc => "2.16.840.1.113883.6.1",
            CodeSystem::Snomed => "2.16.840.1.113883.6.96",
            CodeSystem::Icd10 => "2.16.840.1.113883.6.90",
            CodeSystem::RxNorm => "2.16.840.1.113883.6.88",
        }
    }

    /// Human-readable name used in narrative tables
    pub fn display_name(&self) -> &'static str {
        match self {
            CodeSystem::Loinc => "LOINC",
            CodeSystem::Snomed => "SNOMED CT",
            CodeSystem::Icd10 => "ICD-10-CM",
            CodeSystem::RxNorm => "RxNorm",
        }
    }

    /// Resolves a system from either its URI or its OID
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|system| system.uri() == identifier || system.oid() == identifier)
    }
}

impl fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A clinical code
///
/// # Examples
///
/// ```
/// use eicr_refiner::domain::code::Code;
///
/// let a = Code::new("http://loinc.org", "94500-6").with_display("SARS-CoV-2 RNA");
/// let b = Code::new("http://loinc.org", "94500-6");
/// assert_eq!(a, b); // display text does not take part in equality
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Code {
    /// System URI (or OID for codes taken straight from a document)
    pub system: String,

    /// Code value
    pub code: String,

    /// Display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Code {
    /// Creates a code without display text
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: None,
        }
    }

    /// Sets the display text
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// The known grouper system this code belongs to, if any
    pub fn code_system(&self) -> Option<CodeSystem> {
        CodeSystem::from_identifier(&self.system)
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.system == other.system && self.code == other.code
    }
}

impl Eq for Code {}

impl Hash for Code {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.system.hash(state);
        self.code.hash(state);
    }
}

impl PartialOrd for Code {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Code {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.system, &self.code).cmp(&(&other.system, &other.code))
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)
    }
}
