//! Minimal-section builder
//!
//! A minimal section keeps its identity (templateId, code, title) but loses
//! every entry, gets the placeholder narrative and is flagged with
//! `nullFlavor="NI"`. Applying the transformation again changes nothing.
//!
//! The narrative message defaults to [`DETAILS_REMOVED`]; the section
//! catalog can set a different one per section.

use super::narrative::{placeholder_text, replace_text};
use super::remove_entries;
use crate::document::Element;

/// Default message shown in a minimal section's narrative
pub const DETAILS_REMOVED: &str = "Section details have been removed as requested";

/// Withholding marker set on minimal sections
pub const WITHHELD_NULL_FLAVOR: &str = "NI";

/// Rewrites `section` into its minimal form, returning the entries removed
pub fn apply_minimal(section: &mut Element, message: &str) -> usize {
    let removed = remove_entries(section, |_| false);
    let text = placeholder_text(section, message);
    replace_text(section, text);
    section.set_attr("nullFlavor", WITHHELD_NULL_FLAVOR);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{XmlTree, HL7_NS};

    const SECTION: &str = r#"<section xmlns="urn:hl7-org:v3">
  <templateId root="2.16.840.1.113883.10.20.22.2.17"/>
  <code code="29762-2" codeSystem="2.16.840.1.113883.6.1"/>
  <title>Social History</title>
  <text><paragraph>Smoker</paragraph></text>
  <entry><observation><code code="72166-2"/></observation></entry>
  <entry><observation><code code="11367-0"/></observation></entry>
</section>"#;

    #[test]
    fn test_minimal_section_shape() {
        let mut tree = XmlTree::parse(SECTION).unwrap();
        let removed = apply_minimal(tree.root_mut(), DETAILS_REMOVED);

        let section = tree.root();
        assert_eq!(removed, 2);
        assert_eq!(section.attr("nullFlavor"), Some("NI"));
        assert!(section.find_child(HL7_NS, "entry").is_none());
        assert!(section.find_child(HL7_NS, "templateId").is_some());
        assert!(section.find_child(HL7_NS, "title").is_some());

        let text = section.find_child(HL7_NS, "text").unwrap();
        let rows = text.descendants().filter(|e| e.local_name() == "tr").count();
        assert_eq!(rows, 1);
        assert!(text.text_content().contains(DETAILS_REMOVED));
    }

    #[test]
    fn test_minimal_is_idempotent() {
        let mut once = XmlTree::parse(SECTION).unwrap();
        apply_minimal(once.root_mut(), DETAILS_REMOVED);
        let once_xml = once.to_xml_string().unwrap();

        let mut twice = once.clone();
        assert_eq!(apply_minimal(twice.root_mut(), DETAILS_REMOVED), 0);
        assert_eq!(twice.to_xml_string().unwrap(), once_xml);
    }

    #[test]
    fn test_minimal_creates_missing_text() {
        let mut tree = XmlTree::parse(
            r#"<section xmlns="urn:hl7-org:v3"><code code="29762-2"/><entry/></section>"#,
        )
        .unwrap();
        apply_minimal(tree.root_mut(), DETAILS_REMOVED);

        let names: Vec<&str> = tree.root().child_elements().map(Element::local_name).collect();
        assert_eq!(names, vec!["code", "text"]);
    }

    #[test]
    fn test_minimal_uses_given_message() {
        let mut tree = XmlTree::parse(SECTION).unwrap();
        apply_minimal(tree.root_mut(), "Withheld by jurisdiction policy");

        let text = tree.root().find_child(HL7_NS, "text").unwrap();
        assert!(text.text_content().contains("Withheld by jurisdiction policy"));
        assert!(!text.text_content().contains(DETAILS_REMOVED));
    }
}
