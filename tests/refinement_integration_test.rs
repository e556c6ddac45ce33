//! Integration tests for eICR refinement

mod common;

use common::*;
use eicr_refiner::core::predicate::Predicate;
use eicr_refiner::core::refine::apply_plan;
use eicr_refiner::core::section::{process_section, SectionOutcome, SectionProfile};
use eicr_refiner::document::cda::{child_code, find_structured_body, sections};
use eicr_refiner::document::{Document, EicrVersion, Element, XmlTree, HL7_NS};
use eicr_refiner::domain::{
    Code, ConditionId, RefinerError, SectionAction, SectionActions, SectionCode,
};

fn id(code: &str) -> ConditionId {
    ConditionId::new(code).unwrap()
}

fn code(value: &str) -> SectionCode {
    SectionCode::new(value).unwrap()
}

fn actions(pairs: &[(&str, SectionAction)]) -> SectionActions {
    pairs.iter().map(|(c, a)| (code(c), *a)).collect()
}

/// Parsed copy of the section with the given LOINC code
fn section_of(xml: &str, section_code: &str) -> Element {
    let tree = XmlTree::parse(xml).unwrap();
    let body = find_structured_body(&tree).unwrap();
    let found = sections(body)
        .find(|s| child_code(s) == Some(section_code))
        .cloned()
        .unwrap_or_else(|| panic!("section {section_code} not found"));
    found
}

fn sample_eicr() -> String {
    eicr(
        EICR_V1_1,
        &[
            section(
                RESULTS,
                "Results",
                &[
                    observation_entry("94500-6", "SARS-CoV-2 RNA"),
                    observation_entry("2345-7", "Glucose"),
                    observation_entry("548-8", "Bordetella pertussis culture"),
                ],
            ),
            section(
                PROBLEMS,
                "Problems",
                &[
                    problem_entry(COVID, "COVID-19"),
                    problem_entry("38341003", "Hypertension"),
                ],
            ),
            section(
                SOCIAL_HISTORY,
                "Social History",
                &[observation_entry("72166-2", "Tobacco smoking status")],
            ),
        ],
    )
}

#[tokio::test]
async fn test_refine_document_for_one_condition() {
    let document = Document::new(sample_eicr(), None);
    let refined = refiner()
        .refine(
            &document,
            &actions(&[(SOCIAL_HISTORY, SectionAction::Remove)]),
            &[vec![id(COVID)]],
        )
        .await
        .unwrap();

    assert_eq!(refined.version, EicrVersion::V1_1);
    assert_eq!(refined.sections.len(), 3);

    let results = refined.section(&code(RESULTS)).unwrap();
    assert_eq!(results.outcome(), SectionOutcome::Pruned);
    assert_eq!(results.processing.entries_before, 3);
    assert_eq!(results.processing.entries_after, 1);

    let problems = refined.section(&code(PROBLEMS)).unwrap();
    assert_eq!(problems.processing.entries_after, 1);
    assert!(problems.processing.matched_codes.contains(COVID));

    let social = refined.section(&code(SOCIAL_HISTORY)).unwrap();
    assert_eq!(social.outcome(), SectionOutcome::Emptied);

    assert!(refined.eicr.contains("94500-6"));
    assert!(!refined.eicr.contains("Glucose"));
    assert!(!refined.eicr.contains("Hypertension"));
    assert!(!refined.eicr.contains("Tobacco"));
    assert!(refined.eicr.contains("Output from eICR Refiner"));
    assert_eq!(entry_count(&refined.eicr), 2);
}

#[tokio::test]
async fn test_refined_narrative_lists_matches() {
    let document = Document::new(sample_eicr(), None);
    let refined = refiner()
        .refine(&document, &SectionActions::new(), &[vec![id(COVID)]])
        .await
        .unwrap();

    let results = section_of(&refined.eicr, RESULTS);
    let text = results.find_child(HL7_NS, "text").unwrap();
    let narrative = text.text_content();
    assert!(narrative.contains("SARS-CoV-2 RNA"));
    assert!(narrative.contains("TRUE"));
    assert!(!narrative.contains("Original narrative"));
}

#[test]
fn test_refine_without_match_builds_minimal_section() {
    let xml = section(
        RESULTS,
        "Results",
        &[observation_entry("2345-7", "Glucose"), observation_entry("718-7", "Hemoglobin")],
    );
    let mut tree = XmlTree::parse(&format!(
        r#"<structuredBody xmlns="urn:hl7-org:v3">{xml}</structuredBody>"#
    ))
    .unwrap();
    let predicate = Predicate::build(&[Code::new("http://loinc.org", "10164-2")]);

    let body = tree.root_mut();
    let component = body.child_elements_mut().next().unwrap();
    let section = component.find_child_mut(HL7_NS, "section").unwrap();
    let processing =
        process_section(section, SectionAction::Refine, &predicate, SectionProfile::default())
            .unwrap();

    assert_eq!(processing.outcome, SectionOutcome::Emptied);
    assert_eq!(section.attr("nullFlavor"), Some("NI"));
    assert!(section.find_child(HL7_NS, "entry").is_none());

    let text = section.find_child(HL7_NS, "text").unwrap();
    let rows: Vec<&Element> = text.descendants().filter(|e| e.local_name() == "tr").collect();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_empty_condition_list_rejected() {
    let document = Document::new(sample_eicr(), None);
    let refiner = refiner();

    let err = refiner
        .refine(&document, &SectionActions::new(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RefinerError::ConditionCodeRequired));
    assert!(err.is_client_error());

    let err = refiner
        .refine_per_condition(&document, &SectionActions::new(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RefinerError::ConditionCodeRequired));
}

#[tokio::test]
async fn test_overlapping_groupers_merge_without_duplicates() {
    let plan = refiner()
        .plan(EicrVersion::V1_1, &SectionActions::new(), &[id(COVID), id(PERTUSSIS)])
        .await
        .unwrap();

    let predicate = plan.predicate();
    // 3 + 1 COVID codes, 2 + 1 pertussis codes, one LOINC code shared
    assert_eq!(predicate.len(), 6);
    assert!(predicate.codes().any(|c| c == "94500-6"));
    assert!(predicate.codes().any(|c| c == "548-8"));
    assert_eq!(predicate.query().matches("'68991-9'").count(), 4);

    let document = Document::new(sample_eicr(), None);
    let refined = apply_plan(&document, &plan).unwrap();
    let results = refined.section(&code(RESULTS)).unwrap();
    assert_eq!(results.processing.entries_after, 2);
    assert!(refined.eicr.contains("548-8"));
    assert!(refined.eicr.contains("94500-6"));
}

#[tokio::test]
async fn test_retain_leaves_section_untouched() {
    let source = sample_eicr();
    let document = Document::new(source.clone(), None);
    let refined = refiner()
        .refine(
            &document,
            &actions(&[
                (RESULTS, SectionAction::Retain),
                (PROBLEMS, SectionAction::Retain),
            ]),
            &[vec![id(PERTUSSIS)]],
        )
        .await
        .unwrap();

    assert_eq!(section_of(&refined.eicr, RESULTS), section_of(&source, RESULTS));
    assert_eq!(section_of(&refined.eicr, PROBLEMS), section_of(&source, PROBLEMS));
    assert_eq!(
        refined.section(&code(RESULTS)).unwrap().outcome(),
        SectionOutcome::Untouched
    );
}

#[tokio::test]
async fn test_refine_never_adds_entries() {
    let source = sample_eicr();
    let document = Document::new(source.clone(), None);
    let refined = refiner()
        .refine(&document, &SectionActions::new(), &[vec![id(COVID), id(PERTUSSIS)]])
        .await
        .unwrap();

    for report in &refined.sections {
        assert!(report.processing.entries_after <= report.processing.entries_before);

        let before = section_of(&source, report.code.as_str());
        let after = section_of(&refined.eicr, report.code.as_str());
        let original: Vec<&Element> = before
            .child_elements()
            .filter(|e| e.is(HL7_NS, "entry"))
            .collect();
        for kept in after.child_elements().filter(|e| e.is(HL7_NS, "entry")) {
            assert!(original.contains(&kept), "entry not present in source");
        }
    }
}

#[tokio::test]
async fn test_no_match_equals_remove() {
    let document = Document::new(sample_eicr(), None);
    let refiner = refiner();

    // Problems carries no pertussis code
    let refined = refiner
        .refine(&document, &SectionActions::new(), &[vec![id(PERTUSSIS)]])
        .await
        .unwrap();
    let removed = refiner
        .refine(
            &document,
            &actions(&[(PROBLEMS, SectionAction::Remove)]),
            &[vec![id(PERTUSSIS)]],
        )
        .await
        .unwrap();

    assert_eq!(
        section_of(&refined.eicr, PROBLEMS),
        section_of(&removed.eicr, PROBLEMS)
    );
}

#[tokio::test]
async fn test_refinement_is_idempotent() {
    let refiner = refiner();
    let conditions = [vec![id(COVID)]];
    let actions = actions(&[(SOCIAL_HISTORY, SectionAction::Remove)]);

    let once = refiner
        .refine(&Document::new(sample_eicr(), None), &actions, &conditions)
        .await
        .unwrap();
    let twice = refiner
        .refine(&Document::new(once.eicr.clone(), None), &actions, &conditions)
        .await
        .unwrap();

    assert_eq!(once.eicr, twice.eicr);
    assert_eq!(
        twice.section(&code(SOCIAL_HISTORY)).unwrap().processing.entries_before,
        0
    );
}

#[tokio::test]
async fn test_translation_code_matches() {
    let source = eicr(
        EICR_V1_1,
        &[section(
            RESULTS,
            "Results",
            &[
                translation_entry("LOCAL-1", "94500-6"),
                translation_entry("LOCAL-2", "LOCAL-3"),
            ],
        )],
    );
    let refined = refiner()
        .refine(&Document::new(source, None), &SectionActions::new(), &[vec![id(COVID)]])
        .await
        .unwrap();

    assert_eq!(refined.sections[0].processing.entries_after, 1);
    assert!(refined.eicr.contains("LOCAL-1"));
    assert!(!refined.eicr.contains("LOCAL-2"));
}

#[tokio::test]
async fn test_per_condition_refinement() {
    let document = Document::new(sample_eicr(), None);
    let refined = refiner()
        .refine_per_condition(
            &document,
            &SectionActions::new(),
            &[id(COVID), id(PERTUSSIS), id(COVID)],
        )
        .await
        .unwrap();

    assert_eq!(refined.len(), 2);
    assert_eq!(refined[0].conditions, vec![id(COVID)]);
    assert!(refined[0].eicr.contains("94500-6"));
    assert!(!refined[0].eicr.contains("548-8"));
    assert_eq!(refined[1].conditions, vec![id(PERTUSSIS)]);
    assert!(refined[1].eicr.contains("548-8"));
    assert_ne!(refined[0].plan_fingerprint, refined[1].plan_fingerprint);
}

#[tokio::test]
async fn test_plan_reuse_across_documents() {
    let refiner = refiner();
    let plan = refiner
        .plan(EicrVersion::V1_1, &SectionActions::new(), &[id(COVID)])
        .await
        .unwrap();

    let first = apply_plan(&Document::new(sample_eicr(), None), &plan).unwrap();
    let second = apply_plan(&Document::new(sample_eicr(), None), &plan).unwrap();

    assert_eq!(first.eicr, second.eicr);
    assert_eq!(first.plan_fingerprint, plan.fingerprint());
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_unsupported_version() {
    let source = eicr("2099-01-01", &[section(RESULTS, "Results", &[])]);
    let err = refiner()
        .refine(&Document::new(source, None), &SectionActions::new(), &[vec![id(COVID)]])
        .await
        .unwrap_err();
    assert!(matches!(err, RefinerError::UnsupportedVersion(_)));
}

#[tokio::test]
async fn test_match_outside_entry_is_structure_error() {
    let source = eicr(
        EICR_V1_1,
        &[r#"      <component>
        <section>
          <code code="30954-2" codeSystem="2.16.840.1.113883.6.1"/>
          <observation><code code="94500-6"/></observation>
        </section>
      </component>
"#
        .to_string()],
    );
    let err = refiner()
        .refine(&Document::new(source, None), &SectionActions::new(), &[vec![id(COVID)]])
        .await
        .unwrap_err();
    assert!(matches!(err, RefinerError::Structure(_)));
}

#[tokio::test]
async fn test_malformed_document() {
    let err = refiner()
        .refine(
            &Document::new("<ClinicalDocument><component>", None),
            &SectionActions::new(),
            &[vec![id(COVID)]],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RefinerError::DocumentParse { .. }));
}
