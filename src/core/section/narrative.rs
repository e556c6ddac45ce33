//! Section narrative (`<text>`) generation
//!
//! Refined and minimal sections both get a generated narrative table with a
//! fixed caption. New elements copy the section's prefix and namespace so
//! they serialize inside whatever default namespace the section uses.

use crate::document::cda::is_hl7;
use crate::document::{Element, Node};
use crate::domain::CodeSystem;

/// Caption of every generated narrative table
pub const NARRATIVE_CAPTION: &str = "Output from eICR Refiner";

const HEADERS: [&str; 4] = ["Display Text", "Code", "Code System", "Matches Condition"];
const MATCH_FLAG: &str = "TRUE";

/// One matched code shown in a refined section's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeRow {
    pub display_text: String,
    pub code: String,
    pub code_system: String,
}

impl NarrativeRow {
    /// Builds a row from a code-bearing element (`code`, `translation`, `value`)
    pub fn from_coded_element(element: &Element) -> Self {
        let display_text = element
            .attr("displayName")
            .map(str::to_string)
            .or_else(|| {
                element
                    .child_elements()
                    .find(|c| is_hl7(c, "originalText"))
                    .map(|t| t.text_content().trim().to_string())
            })
            .unwrap_or_default();

        let code_system = element
            .attr("codeSystemName")
            .map(str::to_string)
            .or_else(|| {
                element.attr("codeSystem").map(|oid| {
                    CodeSystem::from_identifier(oid)
                        .map(|system| system.display_name().to_string())
                        .unwrap_or_else(|| oid.to_string())
                })
            })
            .unwrap_or_default();

        Self {
            display_text,
            code: element.attr("code").unwrap_or_default().to_string(),
            code_system,
        }
    }
}

fn cell(like: &Element, tag: &str, text: &str) -> Element {
    Element::new_like(like, tag).with_text(text)
}

fn row(like: &Element, tag: &str, cells: &[&str]) -> Element {
    cells
        .iter()
        .fold(Element::new_like(like, "tr"), |tr, text| tr.with_child(cell(like, tag, text)))
}

fn table(like: &Element) -> Element {
    Element::new_like(like, "table")
        .with_attr("border", "1")
        .with_child(cell(like, "caption", NARRATIVE_CAPTION))
}

/// `<text>` for a refined section: one row per matched code
pub fn refined_text(section: &Element, rows: &[NarrativeRow]) -> Element {
    let head = Element::new_like(section, "thead").with_child(row(section, "th", &HEADERS));
    let body = rows.iter().fold(Element::new_like(section, "tbody"), |tbody, r| {
        tbody.with_child(row(
            section,
            "td",
            &[
                r.display_text.as_str(),
                r.code.as_str(),
                r.code_system.as_str(),
                MATCH_FLAG,
            ],
        ))
    });

    Element::new_like(section, "text").with_child(table(section).with_child(head).with_child(body))
}

/// `<text>` for a minimal section: a single row with `message`
pub fn placeholder_text(section: &Element, message: &str) -> Element {
    let body = Element::new_like(section, "tbody").with_child(row(section, "td", &[message]));
    Element::new_like(section, "text").with_child(table(section).with_child(body))
}

/// Puts `text` in place of the section's `<text>`
///
/// Without an existing `<text>` the new one goes right after `title`, else
/// after `code`, else at the end.
pub fn replace_text(section: &mut Element, text: Element) {
    let children = section.children_mut();
    let position_of = |local: &str| {
        children
            .iter()
            .rposition(|n| n.as_element().is_some_and(|e| is_hl7(e, local)))
    };

    if let Some(index) = position_of("text") {
        children[index] = Node::Element(text);
        return;
    }

    match position_of("title").or_else(|| position_of("code")) {
        Some(index) => children.insert(index + 1, Node::Element(text)),
        None => children.push(Node::Element(text)),
    }
}
