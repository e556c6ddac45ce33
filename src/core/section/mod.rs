//! Section processing
//!
//! Each section handled by a refinement runs through one state transition
//! chosen by its [`SectionAction`]:
//!
//! | action | predicate matches | result |
//! |--------|-------------------|--------|
//! | retain | (not evaluated) | untouched |
//! | remove | (not evaluated) | minimal section |
//! | refine | none, or `NeverMatches` | minimal section |
//! | refine | some entries | matching entries kept, narrative regenerated |
//!
//! Only direct `entry` children are ever removed. A match that does not sit
//! inside an entry means the section is not entry-wrapped the way the
//! refinement requires, and the whole refinement fails.

pub mod minimal;
pub mod narrative;

pub use minimal::{apply_minimal, DETAILS_REMOVED};
pub use narrative::NarrativeRow;

use crate::core::predicate::Predicate;
use crate::document::cda::{has_template, is_hl7};
use crate::document::{Element, Node};
use crate::domain::{RefinerError, Result, SectionAction};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// What happened to a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionOutcome {
    /// Retained as-is
    Untouched,
    /// Refined, every entry matched
    Preserved,
    /// Refined, some entries removed
    Pruned,
    /// Replaced with the minimal section
    Emptied,
}

impl SectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionOutcome::Untouched => "untouched",
            SectionOutcome::Preserved => "preserved",
            SectionOutcome::Pruned => "pruned",
            SectionOutcome::Emptied => "emptied",
        }
    }
}

impl fmt::Display for SectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog settings that shape how one section is processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionProfile<'a> {
    /// templateId root of trigger-code entries
    pub trigger_template: Option<&'a str>,
    /// Minimal-section message; [`DETAILS_REMOVED`] when unset
    pub minimal_text: Option<&'a str>,
}

impl SectionProfile<'_> {
    fn minimal_message(&self) -> &str {
        self.minimal_text.unwrap_or(DETAILS_REMOVED)
    }
}

/// Result of processing one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionProcessing {
    pub outcome: SectionOutcome,
    pub entries_before: usize,
    pub entries_after: usize,
    /// Distinct codes that matched, sorted
    pub matched_codes: BTreeSet<String>,
    /// Kept entries that carry the section's trigger-code template
    pub trigger_entries_kept: usize,
}

/// Applies `action` to `section` in place
///
/// # Errors
///
/// [`RefinerError::Structure`] when refining finds a match outside every
/// entry. The section is left unmodified in that case.
pub fn process_section(
    section: &mut Element,
    action: SectionAction,
    predicate: &Predicate,
    profile: SectionProfile<'_>,
) -> Result<SectionProcessing> {
    let entries_before = entry_indices(section).len();

    match action {
        SectionAction::Retain => Ok(SectionProcessing {
            outcome: SectionOutcome::Untouched,
            entries_before,
            entries_after: entries_before,
            matched_codes: BTreeSet::new(),
            trigger_entries_kept: count_trigger_entries(section, profile.trigger_template),
        }),
        SectionAction::Remove => Ok(emptied(section, profile, entries_before)),
        SectionAction::Refine => refine_section(section, predicate, profile, entries_before),
    }
}

fn emptied(
    section: &mut Element,
    profile: SectionProfile<'_>,
    entries_before: usize,
) -> SectionProcessing {
    apply_minimal(section, profile.minimal_message());
    SectionProcessing {
        outcome: SectionOutcome::Emptied,
        entries_before,
        entries_after: 0,
        matched_codes: BTreeSet::new(),
        trigger_entries_kept: 0,
    }
}

fn refine_section(
    section: &mut Element,
    predicate: &Predicate,
    profile: SectionProfile<'_>,
    entries_before: usize,
) -> Result<SectionProcessing> {
    if predicate.is_never() {
        return Ok(emptied(section, profile, entries_before));
    }

    check_entry_wrapping(section, predicate)?;

    let mut keep = HashSet::new();
    let mut rows = Vec::new();
    let mut matched_codes = BTreeSet::new();
    for (index, node) in section.children().iter().enumerate() {
        let Some(entry) = node.as_element().filter(|e| is_hl7(e, "entry")) else {
            continue;
        };
        for (element, kind) in predicate.find_matches(entry) {
            keep.insert(index);
            if kind.is_code_bearing() {
                rows.push(NarrativeRow::from_coded_element(element));
                if let Some(code) = element.attr("code") {
                    matched_codes.insert(code.trim().to_string());
                }
            }
        }
    }

    if keep.is_empty() {
        return Ok(emptied(section, profile, entries_before));
    }

    remove_entries(section, |index| keep.contains(&index));
    let text = narrative::refined_text(section, &rows);
    narrative::replace_text(section, text);

    let entries_after = keep.len();
    Ok(SectionProcessing {
        outcome: if entries_after == entries_before {
            SectionOutcome::Preserved
        } else {
            SectionOutcome::Pruned
        },
        entries_before,
        entries_after,
        matched_codes,
        trigger_entries_kept: count_trigger_entries(section, profile.trigger_template),
    })
}

/// Fails if a match in the section has no `entry` ancestor
///
/// The section's own `code` child identifies the section and is not
/// evaluated.
fn check_entry_wrapping(section: &Element, predicate: &Predicate) -> Result<()> {
    for child in section.child_elements() {
        if is_hl7(child, "entry") || is_hl7(child, "code") {
            continue;
        }
        if let Some(unwrapped) = first_unwrapped_match(child, predicate) {
            return Err(RefinerError::Structure(format!(
                "matched <{}> with code '{}' has no entry ancestor",
                unwrapped.local_name(),
                unwrapped.attr("code").unwrap_or_default()
            )));
        }
    }
    Ok(())
}

fn first_unwrapped_match<'a>(element: &'a Element, predicate: &Predicate) -> Option<&'a Element> {
    if is_hl7(element, "entry") {
        return None;
    }
    if predicate.matches(element) {
        return Some(element);
    }
    element
        .child_elements()
        .find_map(|child| first_unwrapped_match(child, predicate))
}

fn entry_indices(section: &Element) -> Vec<usize> {
    section
        .children()
        .iter()
        .enumerate()
        .filter(|(_, node)| node.as_element().is_some_and(|e| is_hl7(e, "entry")))
        .map(|(index, _)| index)
        .collect()
}

fn count_trigger_entries(section: &Element, trigger_template: Option<&str>) -> usize {
    let Some(root) = trigger_template else {
        return 0;
    };
    section
        .child_elements()
        .filter(|e| is_hl7(e, "entry"))
        .filter(|entry| entry.descendants().any(|e| has_template(e, root)))
        .count()
}

/// Removes the direct `entry` children whose child index `keep` rejects
///
/// Whitespace-only text right before a removed entry goes with it.
/// Returns the number of entries removed.
pub(crate) fn remove_entries(section: &mut Element, keep: impl Fn(usize) -> bool) -> usize {
    let old = std::mem::take(section.children_mut());
    let mut retained: Vec<Node> = Vec::with_capacity(old.len());
    let mut removed = 0;

    for (index, node) in old.into_iter().enumerate() {
        let is_entry = node.as_element().is_some_and(|e| is_hl7(e, "entry"));
        if is_entry && !keep(index) {
            removed += 1;
            while retained.last().is_some_and(Node::is_blank_text) {
                retained.pop();
            }
        } else {
            retained.push(node);
        }
    }

    *section.children_mut() = retained;
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{XmlTree, HL7_NS};

    const PROBLEMS: &str = r#"<section xmlns="urn:hl7-org:v3">
  <templateId root="2.16.840.1.113883.10.20.22.2.5.1"/>
  <code code="11450-4" codeSystem="2.16.840.1.113883.6.1"/>
  <title>Problems</title>
  <text>Original narrative</text>
  <entry><act><entryRelationship><observation>
    <templateId root="2.16.840.1.113883.10.20.15.2.3.3"/>
    <code code="64572001"/>
    <value code="840539006" codeSystem="2.16.840.1.113883.6.96" displayName="COVID-19"/>
  </observation></entryRelationship></act></entry>
  <entry><observation>
    <code code="64572001"/>
    <value code="38341003" codeSystem="2.16.840.1.113883.6.96" displayName="Hypertension"/>
  </observation></entry>
  <entry><observation>
    <code code="64572001"/>
    <value code="44054006" codeSystem="2.16.840.1.113883.6.96" displayName="Diabetes"/>
  </observation></entry>
</section>"#;

    const TRIGGER: &str = "2.16.840.1.113883.10.20.15.2.3.3";

    fn problems() -> XmlTree {
        XmlTree::parse(PROBLEMS).unwrap()
    }

    fn predicate(codes: &[&str]) -> Predicate {
        Predicate::from_code_strings(codes.iter().copied())
    }

    fn entry_values(section: &Element) -> Vec<String> {
        section
            .child_elements()
            .filter(|e| e.local_name() == "entry")
            .flat_map(|entry| {
                entry
                    .descendants()
                    .filter(|e| e.local_name() == "value")
                    .filter_map(|v| v.attr("code").map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_retain_leaves_section_untouched() {
        let mut tree = problems();
        let before = tree.clone();
        let result = process_section(
            tree.root_mut(),
            SectionAction::Retain,
            &predicate(&["x"]),
            SectionProfile::default(),
        )
        .unwrap();

        assert_eq!(result.outcome, SectionOutcome::Untouched);
        assert_eq!(result.entries_after, 3);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_refine_keeps_matching_entries() {
        let mut tree = problems();
        let result = process_section(
            tree.root_mut(),
            SectionAction::Refine,
            &predicate(&["840539006", "44054006"]),
            SectionProfile {
                trigger_template: Some(TRIGGER),
                ..SectionProfile::default()
            },
        )
        .unwrap();

        assert_eq!(result.outcome, SectionOutcome::Pruned);
        assert_eq!(result.entries_before, 3);
        assert_eq!(result.entries_after, 2);
        assert_eq!(result.trigger_entries_kept, 1);
        assert_eq!(
            result.matched_codes.into_iter().collect::<Vec<_>>(),
            vec!["44054006", "840539006"]
        );
        assert_eq!(entry_values(tree.root()), vec!["840539006", "44054006"]);

        let text = tree.root().find_child(HL7_NS, "text").unwrap();
        let body_rows = text
            .descendants()
            .filter(|e| e.local_name() == "tbody")
            .flat_map(|tbody| tbody.child_elements())
            .count();
        assert_eq!(body_rows, 2);
        assert!(text.text_content().contains("COVID-19"));
        assert!(!text.text_content().contains("Original narrative"));
        assert_eq!(tree.root().attr("nullFlavor"), None);
    }

    #[test]
    fn test_refine_all_matching_is_preserved() {
        let mut tree = problems();
        let result = process_section(
            tree.root_mut(),
            SectionAction::Refine,
            &predicate(&["64572001"]),
            SectionProfile::default(),
        )
        .unwrap();

        assert_eq!(result.outcome, SectionOutcome::Preserved);
        assert_eq!(result.entries_after, 3);
    }

    #[test]
    fn test_refine_without_matches_equals_remove() {
        let mut refined = problems();
        let mut removed = problems();

        let profile = SectionProfile::default();
        let r = process_section(
            refined.root_mut(),
            SectionAction::Refine,
            &predicate(&["10164-2"]),
            profile,
        )
        .unwrap();
        let m = process_section(
            removed.root_mut(),
            SectionAction::Remove,
            &predicate(&["840539006"]),
            profile,
        )
        .unwrap();

        assert_eq!(r.outcome, SectionOutcome::Emptied);
        assert_eq!(m.outcome, SectionOutcome::Emptied);
        assert_eq!(
            refined.to_xml_string().unwrap(),
            removed.to_xml_string().unwrap()
        );
    }

    #[test]
    fn test_never_matches_empties_section() {
        let mut tree = problems();
        let result = process_section(
            tree.root_mut(),
            SectionAction::Refine,
            &Predicate::NeverMatches,
            SectionProfile::default(),
        )
        .unwrap();
        assert_eq!(result.outcome, SectionOutcome::Emptied);
        assert_eq!(tree.root().attr("nullFlavor"), Some("NI"));
    }

    #[test]
    fn test_section_code_match_is_not_an_entry_match() {
        let mut tree = problems();
        let result = process_section(
            tree.root_mut(),
            SectionAction::Refine,
            &predicate(&["11450-4"]),
            SectionProfile::default(),
        )
        .unwrap();
        assert_eq!(result.outcome, SectionOutcome::Emptied);
    }

    #[test]
    fn test_unwrapped_match_is_structure_error() {
        let mut tree = XmlTree::parse(
            r#"<section xmlns="urn:hl7-org:v3"><code code="11450-4"/>
                 <observation><code code="840539006"/></observation>
                 <entry><observation><code code="840539006"/></observation></entry>
               </section>"#,
        )
        .unwrap();
        let before = tree.clone();

        let err = process_section(
            tree.root_mut(),
            SectionAction::Refine,
            &predicate(&["840539006"]),
            SectionProfile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RefinerError::Structure(_)));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_profile_minimal_text_used_when_emptied() {
        let mut tree = problems();
        let profile = SectionProfile {
            minimal_text: Some("Problems withheld"),
            ..SectionProfile::default()
        };
        process_section(tree.root_mut(), SectionAction::Remove, &predicate(&["x"]), profile)
            .unwrap();

        let text = tree.root().find_child(HL7_NS, "text").unwrap();
        assert!(text.text_content().contains("Problems withheld"));
        assert!(!text.text_content().contains(DETAILS_REMOVED));
    }

    #[test]
    fn test_remove_entries_drops_leading_whitespace() {
        let mut tree = XmlTree::parse(
            "<section xmlns=\"urn:hl7-org:v3\">\n  <title/>\n  <entry/>\n  <entry/>\n</section>",
        )
        .unwrap();
        let removed = remove_entries(tree.root_mut(), |_| false);
        assert_eq!(removed, 2);
        assert_eq!(
            XmlTree::element_to_string(tree.root()).unwrap(),
            "<section xmlns=\"urn:hl7-org:v3\">\n  <title/>\n</section>"
        );
    }
}
