//! Refinement plans
//!
//! A [`RefinementPlan`] is everything a refinement needs apart from the
//! document: the compiled predicate and the action for every section it
//! will touch. Plans hold no document state, so one plan can refine any
//! number of documents of the same eICR version.

use super::summary::{RefinedDocument, SectionReport};
use crate::config::{SectionCatalog, SectionMetadata};
use crate::core::predicate::Predicate;
use crate::core::section::{process_section, SectionProfile};
use crate::document::cda::{
    child_code, detect_version, find_structured_body_mut, has_template, sections_mut,
};
use crate::document::{Document, EicrVersion, Element};
use crate::domain::{
    ConditionId, RefinerError, Result, SectionAction, SectionActions, SectionCode,
};
use crate::{log_refinement_complete, log_section_outcome};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

/// A section the plan will process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSection {
    pub action: SectionAction,
    pub display_name: Option<String>,
    pub template_id: Option<String>,
    pub trigger_template: Option<String>,
    pub minimal_text: Option<String>,
    pub required: bool,
}

impl PlannedSection {
    fn profile(&self) -> SectionProfile<'_> {
        SectionProfile {
            trigger_template: self.trigger_template.as_deref(),
            minimal_text: self.minimal_text.as_deref(),
        }
    }

    fn from_metadata(action: SectionAction, meta: Option<&SectionMetadata>) -> Self {
        Self {
            action,
            display_name: meta.map(|m| m.display_name.clone()),
            template_id: meta.and_then(|m| m.template_id.clone()),
            trigger_template: meta.and_then(|m| m.trigger_template.clone()),
            minimal_text: meta.and_then(|m| m.minimal_text.clone()),
            required: meta.is_some_and(|m| m.required),
        }
    }
}

/// Predicate plus resolved section actions for one refinement run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementPlan {
    predicate: Predicate,
    sections: BTreeMap<SectionCode, PlannedSection>,
    conditions: Vec<ConditionId>,
    version: EicrVersion,
    fingerprint: String,
}

impl RefinementPlan {
    /// Resolves the section map and fingerprints the plan
    ///
    /// The section set is the catalog's sections for `version` (defaulting to
    /// refine) plus every code in `explicit`; explicit actions win.
    pub fn new(
        predicate: Predicate,
        explicit: &SectionActions,
        catalog: &SectionCatalog,
        version: EicrVersion,
        conditions: Vec<ConditionId>,
    ) -> Self {
        let mut sections: BTreeMap<SectionCode, PlannedSection> = catalog
            .sections_for(version)
            .map(|meta| {
                (
                    meta.code.clone(),
                    PlannedSection::from_metadata(SectionAction::Refine, Some(meta)),
                )
            })
            .collect();

        for (code, action) in explicit {
            sections.insert(
                code.clone(),
                PlannedSection::from_metadata(*action, catalog.get(code)),
            );
        }

        let fingerprint = fingerprint(&predicate, &sections, &conditions, version);
        Self {
            predicate,
            sections,
            conditions,
            version,
            fingerprint,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn conditions(&self) -> &[ConditionId] {
        &self.conditions
    }

    pub fn version(&self) -> EicrVersion {
        self.version
    }

    /// Hex SHA-256 over the predicate query, section actions, conditions and version
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn sections(&self) -> impl Iterator<Item = (&SectionCode, &PlannedSection)> {
        self.sections.iter()
    }

    pub fn action_for(&self, code: &SectionCode) -> Option<SectionAction> {
        self.sections.get(code).map(|s| s.action)
    }

    /// Identifies a document section by its code, else by its templateId
    fn identify(&self, section: &Element) -> Option<(&SectionCode, &PlannedSection)> {
        if let Some(code) = child_code(section).and_then(|c| SectionCode::new(c).ok()) {
            return self.sections.get_key_value(&code);
        }
        self.sections.iter().find(|(_, planned)| {
            planned
                .template_id
                .as_deref()
                .is_some_and(|root| has_template(section, root))
        })
    }
}

fn fingerprint(
    predicate: &Predicate,
    sections: &BTreeMap<SectionCode, PlannedSection>,
    conditions: &[ConditionId],
    version: EicrVersion,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(predicate.query().as_bytes());
    hasher.update(b"\n");
    for (code, planned) in sections {
        hasher.update(format!("{code}={};", planned.action).as_bytes());
    }
    hasher.update(b"\n");
    let mut sorted: Vec<&str> = conditions.iter().map(ConditionId::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    hasher.update(sorted.join(",").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Applies a plan to a fresh parse of the document's eICR
///
/// # Errors
///
/// - [`RefinerError::DocumentParse`] for an unparseable eICR
/// - [`RefinerError::UnsupportedVersion`] when the eICR version is unknown
///   or differs from the plan's
/// - [`RefinerError::Structure`] for a missing structured body or an
///   entry-less match
pub fn apply_plan(document: &Document, plan: &RefinementPlan) -> Result<RefinedDocument> {
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    let mut tree = document.parse_eicr()?;

    let version = detect_version(&tree).ok_or_else(|| {
        RefinerError::UnsupportedVersion(
            "missing or unrecognised eICR document templateId extension".to_string(),
        )
    })?;
    if version != plan.version {
        return Err(RefinerError::UnsupportedVersion(format!(
            "plan targets eICR {} but the document is eICR {}",
            plan.version, version
        )));
    }

    let body = find_structured_body_mut(&mut tree)?;
    let mut reports = Vec::new();
    let mut seen: HashSet<SectionCode> = HashSet::new();

    for section in sections_mut(body) {
        let Some((code, planned)) = plan.identify(section) else {
            continue;
        };
        let processing = process_section(
            section,
            planned.action,
            &plan.predicate,
            planned.profile(),
        )
        .map_err(|e| match e {
            RefinerError::Structure(message) => {
                RefinerError::Structure(format!("section {code}: {message}"))
            }
            other => other,
        })?;

        log_section_outcome!(code, planned.action, processing);
        seen.insert(code.clone());
        reports.push(SectionReport {
            code: code.clone(),
            display_name: planned.display_name.clone(),
            action: planned.action,
            processing,
        });
    }

    for (code, planned) in plan.sections() {
        if planned.required && !seen.contains(code) {
            tracing::debug!(section = %code, "Required section not present in document");
        }
    }

    let eicr = tree.to_xml_string()?;
    let refined = RefinedDocument {
        run_id,
        conditions: plan.conditions.clone(),
        version,
        sections: reports,
        plan_fingerprint: plan.fingerprint.clone(),
        refined_at: Utc::now(),
        eicr,
        rr: document.rr_source().map(str::to_string),
    };

    log_refinement_complete!(refined, started.elapsed());
    Ok(refined)
}
