//! Refinement orchestration
//!
//! [`Refiner`] ties code-set resolution, plan building and plan application
//! together. It is cheap to share behind an `Arc` and holds no per-document
//! state.

use super::plan::{apply_plan, RefinementPlan};
use super::summary::RefinedDocument;
use crate::adapters::terminology::{create_terminology, TerminologyLookup};
use crate::config::{RefinerConfig, SectionCatalog};
use crate::core::predicate::Predicate;
use crate::core::reportability::{extract, reportable_condition_ids};
use crate::core::resolver::CodeSetResolver;
use crate::document::{detect_version, Document, EicrVersion};
use crate::domain::{Code, ConditionId, RefinerError, Result, SectionActions};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Refines eICR documents against condition code sets
pub struct Refiner {
    catalog: Arc<SectionCatalog>,
    resolver: CodeSetResolver,
    custom_codes: Vec<Code>,
}

impl Refiner {
    pub fn new(catalog: Arc<SectionCatalog>, lookup: Arc<dyn TerminologyLookup>) -> Self {
        Self {
            catalog,
            resolver: CodeSetResolver::new(lookup),
            custom_codes: Vec::new(),
        }
    }

    /// Adds codes that join every predicate without a terminology lookup
    pub fn with_custom_codes(mut self, codes: Vec<Code>) -> Self {
        self.custom_codes = codes;
        self
    }

    /// Builds a refiner from configuration: catalog, terminology and custom codes
    ///
    /// # Errors
    ///
    /// [`RefinerError::Configuration`] when the catalog or terminology
    /// backend cannot be loaded.
    pub fn from_config(config: &RefinerConfig) -> Result<Self> {
        let catalog =
            SectionCatalog::from_path_or_builtin(config.refinement.section_catalog.as_deref())?;
        let lookup = create_terminology(&config.terminology)?;

        tracing::debug!(
            sections = catalog.len(),
            custom_codes = config.refinement.custom_codes.len(),
            "Refiner configured"
        );

        Ok(Self::new(Arc::new(catalog), lookup)
            .with_custom_codes(config.refinement.custom_codes.clone()))
    }

    pub fn catalog(&self) -> &SectionCatalog {
        &self.catalog
    }

    /// Resolves `conditions` and compiles a plan for `version`
    ///
    /// Conditions whose grouper cannot be found are skipped. When none
    /// resolve and no custom codes are configured the plan's predicate
    /// matches nothing, so every refined section becomes minimal.
    pub async fn plan(
        &self,
        version: EicrVersion,
        actions: &SectionActions,
        conditions: &[ConditionId],
    ) -> Result<RefinementPlan> {
        let resolution = self.resolver.resolve(conditions).await?;

        let mut codes: BTreeSet<Code> = resolution.codes();
        codes.extend(self.custom_codes.iter().cloned());
        let predicate = Predicate::build(&codes);

        tracing::debug!(
            version = %version,
            codes = predicate.len(),
            skipped = resolution.skipped.len(),
            "Built refinement predicate"
        );

        let mut conditions: Vec<ConditionId> = conditions.to_vec();
        let mut seen = HashSet::new();
        conditions.retain(|c| seen.insert(c.clone()));

        Ok(RefinementPlan::new(
            predicate,
            actions,
            &self.catalog,
            version,
            conditions,
        ))
    }

    /// Refines the document against the union of every condition code set
    ///
    /// # Errors
    ///
    /// - [`RefinerError::ConditionCodeRequired`] when no condition is given
    /// - [`RefinerError::UnsupportedVersion`] for an unrecognised eICR
    /// - parse, structure and lookup errors from the underlying steps
    pub async fn refine(
        &self,
        document: &Document,
        actions: &SectionActions,
        condition_code_sets: &[Vec<ConditionId>],
    ) -> Result<RefinedDocument> {
        let conditions: Vec<ConditionId> = condition_code_sets.iter().flatten().cloned().collect();
        if conditions.is_empty() {
            return Err(RefinerError::ConditionCodeRequired);
        }

        let version = document_version(document)?;
        let plan = self.plan(version, actions, &conditions).await?;
        apply_plan(document, &plan)
    }

    /// One refined document per distinct condition, in input order
    pub async fn refine_per_condition(
        &self,
        document: &Document,
        actions: &SectionActions,
        conditions: &[ConditionId],
    ) -> Result<Vec<RefinedDocument>> {
        if conditions.is_empty() {
            return Err(RefinerError::ConditionCodeRequired);
        }

        let mut seen = HashSet::new();
        let runs = conditions
            .iter()
            .filter(|c| seen.insert(*c))
            .map(|condition| {
                let sets = vec![vec![condition.clone()]];
                async move { self.refine(document, actions, &sets).await }
            });

        try_join_all(runs).await
    }

    /// Refines once per reportable condition found in the document's RR
    ///
    /// Returns an empty list when the RR determines nothing reportable.
    ///
    /// # Errors
    ///
    /// [`RefinerError::Structure`] when the document has no RR or the RR has
    /// no usable summary organizer, plus every error of [`Refiner::refine`].
    pub async fn refine_reportable(
        &self,
        document: &Document,
        actions: &SectionActions,
    ) -> Result<Vec<RefinedDocument>> {
        let rr = document.parse_rr()?;
        let jurisdictions = extract(&rr)?;
        let conditions = reportable_condition_ids(&jurisdictions);

        if conditions.is_empty() {
            tracing::info!("RR contains no reportable conditions; nothing to refine");
            return Ok(Vec::new());
        }

        tracing::info!(
            jurisdictions = jurisdictions.len(),
            conditions = conditions.len(),
            "Refining for reportable conditions"
        );
        self.refine_per_condition(document, actions, &conditions).await
    }
}

fn document_version(document: &Document) -> Result<EicrVersion> {
    let tree = document.parse_eicr()?;
    detect_version(&tree).ok_or_else(|| {
        RefinerError::UnsupportedVersion(
            "missing or unrecognised eICR document templateId extension".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::terminology::{GrouperRecord, InMemoryTerminology};
    use crate::domain::CodeSystem;
    use serde_json::json;

    const EICR: &str = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
  <templateId root="2.16.840.1.113883.10.20.15.2" extension="2016-12-01"/>
  <component>
    <structuredBody>
      <component>
        <section>
          <code code="30954-2" codeSystem="2.16.840.1.113883.6.1"/>
          <title>Results</title>
          <text>All results</text>
          <entry><observation><code code="94500-6" codeSystem="2.16.840.1.113883.6.1" displayName="SARS-CoV-2 RNA"/></observation></entry>
          <entry><observation><code code="2345-7" codeSystem="2.16.840.1.113883.6.1" displayName="Glucose"/></observation></entry>
        </section>
      </component>
    </structuredBody>
  </component>
</ClinicalDocument>"#;

    fn id(code: &str) -> ConditionId {
        ConditionId::new(code).unwrap()
    }

    fn refiner() -> Refiner {
        let terminology = InMemoryTerminology::new().with_grouper(
            GrouperRecord::new("840539006")
                .with_display_name("COVID-19")
                .with_codes(CodeSystem::Loinc, json!([{"code": "94500-6"}])),
        );
        Refiner::new(Arc::new(SectionCatalog::builtin()), Arc::new(terminology))
    }

    #[tokio::test]
    async fn test_refine_requires_condition() {
        let document = Document::new(EICR, None);
        let err = refiner()
            .refine(&document, &SectionActions::new(), &[vec![], vec![]])
            .await
            .unwrap_err();
        assert!(matches!(err, RefinerError::ConditionCodeRequired));
    }

    #[tokio::test]
    async fn test_refine_keeps_matching_entry() {
        let document = Document::new(EICR, None);
        let refined = refiner()
            .refine(&document, &SectionActions::new(), &[vec![id("840539006")]])
            .await
            .unwrap();

        assert!(refined.eicr.contains("94500-6"));
        assert!(!refined.eicr.contains("Glucose"));
        assert_eq!(refined.sections.len(), 1);
        assert_eq!(refined.sections[0].processing.entries_after, 1);
    }

    #[tokio::test]
    async fn test_custom_codes_extend_predicate() {
        let document = Document::new(EICR, None);
        let refined = refiner()
            .with_custom_codes(vec![Code::new("LOINC", "2345-7")])
            .refine(&document, &SectionActions::new(), &[vec![id("840539006")]])
            .await
            .unwrap();

        assert_eq!(refined.sections[0].processing.entries_after, 2);
    }

    #[tokio::test]
    async fn test_unknown_condition_empties_sections() {
        let document = Document::new(EICR, None);
        let refined = refiner()
            .refine(&document, &SectionActions::new(), &[vec![id("0000000")]])
            .await
            .unwrap();

        assert_eq!(refined.sections[0].processing.entries_after, 0);
        assert!(refined.eicr.contains(r#"nullFlavor="NI""#));
    }

    #[tokio::test]
    async fn test_refine_reportable_without_rr() {
        let document = Document::new(EICR, None);
        let err = refiner()
            .refine_reportable(&document, &SectionActions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RefinerError::Structure(_)));
    }
}
