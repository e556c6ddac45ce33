//! CDA vocabulary and navigation helpers
//!
//! Namespace URIs, template identifiers and the handful of structural lookups
//! shared by refinement and reportability extraction.

use super::tree::{Element, XmlTree};
use crate::domain::{RefinerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HL7 v3 namespace used by every CDA element
pub const HL7_NS: &str = "urn:hl7-org:v3";

/// templateId root of the eICR document template
pub const EICR_DOCUMENT_TEMPLATE: &str = "2.16.840.1.113883.10.20.15.2";

/// Published eICR revisions the refiner understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EicrVersion {
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "3.1")]
    V3_1,
    #[serde(rename = "3.1.1")]
    V3_1_1,
}

impl EicrVersion {
    pub const ALL: [EicrVersion; 3] = [EicrVersion::V1_1, EicrVersion::V3_1, EicrVersion::V3_1_1];

    /// templateId extension that identifies this revision
    pub fn extension(&self) -> &'static str {
        match self {
            EicrVersion::V1_1 => "2016-12-01",
            EicrVersion::V3_1 => "2021-01-01",
            EicrVersion::V3_1_1 => "2022-05-01",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EicrVersion::V1_1 => "1.1",
            EicrVersion::V3_1 => "3.1",
            EicrVersion::V3_1_1 => "3.1.1",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.extension() == extension.trim())
    }
}

impl fmt::Display for EicrVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` if the element is `local` in the HL7 namespace
pub fn is_hl7(element: &Element, local: &str) -> bool {
    element.is(HL7_NS, local)
}

/// `true` if any direct `templateId` child has the given root
pub fn has_template(element: &Element, root: &str) -> bool {
    element
        .child_elements()
        .filter(|child| is_hl7(child, "templateId"))
        .any(|t| t.attr("root") == Some(root))
}

/// `@code` of the element's direct `code` child
pub fn child_code(element: &Element) -> Option<&str> {
    element.find_child(HL7_NS, "code").and_then(|c| c.attr("code"))
}

/// Reads the eICR document templateId extension
///
/// Returns `None` for a missing template or an unknown extension. Callers
/// treat `None` as unsupported rather than guessing a revision.
pub fn detect_version(tree: &XmlTree) -> Option<EicrVersion> {
    tree.root()
        .child_elements()
        .filter(|child| is_hl7(child, "templateId"))
        .filter(|t| t.attr("root") == Some(EICR_DOCUMENT_TEMPLATE))
        .find_map(|t| t.attr("extension").and_then(EicrVersion::from_extension))
}

fn structured_body_missing() -> RefinerError {
    RefinerError::Structure("no structuredBody".to_string())
}

/// Locates `ClinicalDocument/component/structuredBody`
pub fn find_structured_body(tree: &XmlTree) -> Result<&Element> {
    tree.root()
        .child_elements()
        .filter(|child| is_hl7(child, "component"))
        .find_map(|component| component.find_child(HL7_NS, "structuredBody"))
        .ok_or_else(structured_body_missing)
}

pub fn find_structured_body_mut(tree: &mut XmlTree) -> Result<&mut Element> {
    tree.root_mut()
        .child_elements_mut()
        .filter(|child| child.is(HL7_NS, "component"))
        .find_map(|component| component.find_child_mut(HL7_NS, "structuredBody"))
        .ok_or_else(structured_body_missing)
}

/// Top-level sections of a structured body (`component/section`)
pub fn sections(body: &Element) -> impl Iterator<Item = &Element> {
    body.child_elements()
        .filter(|child| is_hl7(child, "component"))
        .filter_map(|component| component.find_child(HL7_NS, "section"))
}

pub fn sections_mut(body: &mut Element) -> impl Iterator<Item = &mut Element> {
    body.child_elements_mut()
        .filter(|child| child.is(HL7_NS, "component"))
        .filter_map(|component| component.find_child_mut(HL7_NS, "section"))
}
