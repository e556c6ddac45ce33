//! eICR section catalog
//!
//! Static, versioned metadata for the sections refinement knows about. The
//! catalog is built once (from the built-in table or a TOML override file)
//! and handed to the refiner; nothing mutates it afterwards.
//!
//! # Override file format
//!
//! ```toml
//! [[section]]
//! code = "11450-4"
//! display_name = "Problem Section"
//! required = true
//! template_id = "2.16.840.1.113883.10.20.22.2.5.1"
//! trigger_template = "2.16.840.1.113883.10.20.15.2.3.3"
//! minimal_text = "Problem list withheld"
//! versions = ["1.1", "3.1", "3.1.1"]
//! ```

use crate::document::EicrVersion;
use crate::domain::{RefinerError, Result, SectionCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Metadata for one eICR section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMetadata {
    /// LOINC section code
    pub code: SectionCode,

    /// Human-readable section name
    pub display_name: String,

    /// Whether the eICR template requires the section
    #[serde(default)]
    pub required: bool,

    /// Section templateId root, used to recognise a section without a code
    #[serde(default)]
    pub template_id: Option<String>,

    /// templateId root of trigger-code entries in this section
    #[serde(default)]
    pub trigger_template: Option<String>,

    /// Narrative message for the minimal form of this section
    #[serde(default)]
    pub minimal_text: Option<String>,

    /// eICR versions the section exists in
    #[serde(default = "all_versions")]
    pub versions: Vec<EicrVersion>,
}

impl SectionMetadata {
    pub fn applies_to(&self, version: EicrVersion) -> bool {
        self.versions.contains(&version)
    }
}

fn all_versions() -> Vec<EicrVersion> {
    EicrVersion::ALL.to_vec()
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(rename = "section", default)]
    sections: Vec<SectionMetadata>,
}

/// Immutable section catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCatalog {
    sections: Vec<SectionMetadata>,
}

// (code, display name, required, section template, trigger template, 3.x only)
#[rustfmt::skip]
const BUILTIN: &[(&str, &str, bool, &str, Option<&str>, bool)] = &[
    ("46240-8", "Encounters Section", true, "2.16.840.1.113883.10.20.22.2.22.1", None, false),
    ("10164-2", "History of Present Illness Section", true, "1.3.6.1.4.1.19376.1.5.3.1.3.4", None, false),
    ("11369-6", "Immunizations Section", false, "2.16.840.1.113883.10.20.22.2.2.1", None, false),
    ("29549-3", "Medications Administered Section", true, "2.16.840.1.113883.10.20.22.2.38", None, false),
    ("18776-5", "Plan of Treatment Section", true, "2.16.840.1.113883.10.20.22.2.10", Some("2.16.840.1.113883.10.20.15.2.3.4"), false),
    ("11450-4", "Problem Section", true, "2.16.840.1.113883.10.20.22.2.5.1", Some("2.16.840.1.113883.10.20.15.2.3.3"), false),
    ("29299-5", "Reason for Visit Section", true, "2.16.840.1.113883.10.20.22.2.12", None, false),
    ("30954-2", "Results Section", true, "2.16.840.1.113883.10.20.22.2.3.1", Some("2.16.840.1.113883.10.20.15.2.3.2"), false),
    ("29762-2", "Social History Section", true, "2.16.840.1.113883.10.20.22.2.17", None, false),
    ("10154-3", "Chief Complaint Section", false, "1.3.6.1.4.1.19376.1.5.3.1.1.13.2.1", None, false),
    ("10160-0", "Medications Section", false, "2.16.840.1.113883.10.20.22.2.1.1", None, false),
    ("8716-3", "Vital Signs Section", false, "2.16.840.1.113883.10.20.22.2.4.1", None, false),
    ("47519-4", "Procedures Section", false, "2.16.840.1.113883.10.20.22.2.7.1", None, false),
    ("11348-0", "Past Medical History Section", false, "2.16.840.1.113883.10.20.22.2.20", None, false),
    ("10187-3", "Review of Systems Section", false, "1.3.6.1.4.1.19376.1.5.3.1.3.18", None, false),
    ("48765-2", "Allergies and Intolerances Section", false, "2.16.840.1.113883.10.20.22.2.6.1", None, false),
    ("90767-5", "Pregnancy Section", false, "2.16.840.1.113883.10.20.22.2.80", None, true),
    ("83910-0", "Emergency Outbreak Information Section", false, "2.16.840.1.113883.10.20.15.2.2.4", None, true),
    ("88085-6", "Reportability Response Information Section", false, "2.16.840.1.113883.10.20.15.2.2.5", None, true),
];

impl SectionCatalog {
    /// Builds a catalog, rejecting an empty list and duplicate codes
    pub fn new(sections: Vec<SectionMetadata>) -> Result<Self> {
        if sections.is_empty() {
            return Err(RefinerError::Configuration(
                "Section catalog must define at least one section".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for section in &sections {
            if !seen.insert(section.code.clone()) {
                return Err(RefinerError::Configuration(format!(
                    "Section catalog defines {} more than once",
                    section.code
                )));
            }
            if section.versions.is_empty() {
                return Err(RefinerError::Configuration(format!(
                    "Section {} applies to no eICR version",
                    section.code
                )));
            }
        }

        Ok(Self { sections })
    }

    /// The catalog compiled into the crate
    pub fn builtin() -> Self {
        let sections = BUILTIN
            .iter()
            .filter_map(|&(code, name, required, template, trigger, v3_only)| {
                let code = SectionCode::new(code).ok()?;
                let versions = if v3_only {
                    vec![EicrVersion::V3_1, EicrVersion::V3_1_1]
                } else {
                    all_versions()
                };
                Some(SectionMetadata {
                    code,
                    display_name: name.to_string(),
                    required,
                    template_id: Some(template.to_string()),
                    trigger_template: trigger.map(str::to_string),
                    minimal_text: None,
                    versions,
                })
            })
            .collect();
        Self { sections }
    }

    /// Parses an override catalog from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents).map_err(|e| {
            RefinerError::Configuration(format!("Failed to parse section catalog: {e}"))
        })?;
        Self::new(file.sections)
    }

    /// Loads an override catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RefinerError::Configuration(format!(
                "Failed to read section catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            sections = catalog.len(),
            "Loaded section catalog"
        );
        Ok(catalog)
    }

    /// The override file when one is configured, otherwise the built-in table
    pub fn from_path_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn get(&self, code: &SectionCode) -> Option<&SectionMetadata> {
        self.sections.iter().find(|s| &s.code == code)
    }

    /// Sections refined by default for one eICR version
    pub fn sections_for(&self, version: EicrVersion) -> impl Iterator<Item = &SectionMetadata> {
        self.sections.iter().filter(move |s| s.applies_to(version))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionMetadata> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for SectionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
