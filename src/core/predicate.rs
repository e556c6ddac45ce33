//! Code predicates
//!
//! A [`Predicate`] is compiled once from a resolved code set and answers one
//! question for any element: does it carry one of the codes? Codes appear in
//! several places in CDA, so an HL7 element matches when
//!
//! - its direct `code` child has a matching `@code`,
//! - it is a `code` element with a matching `@code`,
//! - it is a `translation` with a matching `@code`, or
//! - it is a `value` with a matching `@code`.
//!
//! Matching is on the code string alone. An empty code set compiles to
//! [`Predicate::NeverMatches`], which callers check before walking a tree.
//!
//! The predicate also has a textual form ([`Predicate::query`]): an XPath
//! union that selects the same elements. It is what gets logged,
//! fingerprinted and persisted, and [`Predicate::from_query`] reads it back.

use crate::document::cda::{is_hl7, HL7_NS};
use crate::document::Element;
use crate::domain::{Code, RefinerError, Result};
use std::collections::BTreeSet;
use std::fmt;

const NEVER_QUERY: &str = "false()";
const CLAUSES: [(&str, &str); 4] = [
    (".//hl7:*[hl7:code[", "]]"),
    (".//hl7:code[", "]"),
    (".//hl7:translation[", "]"),
    (".//hl7:value[", "]"),
];

/// Where a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// The element's direct `code` child matched
    ChildCode,
    /// The element is a matching `code`
    Code,
    /// The element is a matching `translation`
    Translation,
    /// The element is a matching `value`
    Value,
}

impl MatchKind {
    /// `true` when the matched element itself carries the code
    pub fn is_code_bearing(&self) -> bool {
        !matches!(self, MatchKind::ChildCode)
    }
}

/// Compiled code matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Built from an empty code set; matches no element
    NeverMatches,
    /// Matches elements carrying any of these code strings
    AnyCode(BTreeSet<String>),
}

impl Predicate {
    /// Compiles a predicate from resolved codes
    ///
    /// Codes shared by several systems or groupers collapse into one clause
    /// entry.
    pub fn build<'a>(codes: impl IntoIterator<Item = &'a Code>) -> Self {
        Self::from_code_strings(codes.into_iter().map(|c| c.code.as_str()))
    }

    /// Compiles a predicate from bare code strings
    pub fn from_code_strings<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = BTreeSet::new();
        for code in codes {
            let code = code.trim();
            if !code.is_empty() {
                set.insert(code.to_string());
            }
        }

        if set.is_empty() {
            Predicate::NeverMatches
        } else {
            Predicate::AnyCode(set)
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Predicate::NeverMatches)
    }

    /// The code strings this predicate matches
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        let set = match self {
            Predicate::NeverMatches => None,
            Predicate::AnyCode(set) => Some(set),
        };
        set.into_iter().flatten().map(String::as_str)
    }

    /// Number of distinct codes in the clause list
    pub fn len(&self) -> usize {
        match self {
            Predicate::NeverMatches => 0,
            Predicate::AnyCode(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, code: Option<&str>) -> bool {
        match (self, code) {
            (Predicate::AnyCode(set), Some(code)) => set.contains(code.trim()),
            _ => false,
        }
    }

    /// How `element` matches, if it does
    pub fn match_kind(&self, element: &Element) -> Option<MatchKind> {
        if self.is_never() || element.namespace() != Some(HL7_NS) {
            return None;
        }

        let own = match element.local_name() {
            "code" => Some(MatchKind::Code),
            "translation" => Some(MatchKind::Translation),
            "value" => Some(MatchKind::Value),
            _ => None,
        };
        if let Some(kind) = own {
            if self.contains(element.attr("code")) {
                return Some(kind);
            }
        }

        element
            .child_elements()
            .filter(|child| is_hl7(child, "code"))
            .any(|child| self.contains(child.attr("code")))
            .then_some(MatchKind::ChildCode)
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.match_kind(element).is_some()
    }

    /// Every matching element in `root`'s subtree, `root` included, in document order
    pub fn find_matches<'a>(&self, root: &'a Element) -> Vec<(&'a Element, MatchKind)> {
        if self.is_never() {
            return Vec::new();
        }
        root.descendants_and_self()
            .filter_map(|element| self.match_kind(element).map(|kind| (element, kind)))
            .collect()
    }

    /// XPath union query selecting the same elements
    pub fn query(&self) -> String {
        match self {
            Predicate::NeverMatches => NEVER_QUERY.to_string(),
            Predicate::AnyCode(set) => {
                let condition = set
                    .iter()
                    .map(|code| format!("@code={}", quote(code)))
                    .collect::<Vec<_>>()
                    .join(" or ");
                CLAUSES
                    .iter()
                    .map(|(open, close)| format!("{open}{condition}{close}"))
                    .collect::<Vec<_>>()
                    .join(" | ")
            }
        }
    }

    /// Parses a query produced by [`query`](Self::query)
    ///
    /// # Errors
    ///
    /// [`RefinerError::QueryEvaluation`] for text that is not a predicate
    /// query, including an empty string.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.trim();
        if query == NEVER_QUERY {
            return Ok(Predicate::NeverMatches);
        }
        if query.is_empty() {
            return Err(RefinerError::QueryEvaluation(
                "empty query; use false() for a predicate that matches nothing".to_string(),
            ));
        }

        let parts = split_union(query);
        if parts.len() != CLAUSES.len() {
            return Err(RefinerError::QueryEvaluation(format!(
                "expected {} union clauses, found {}",
                CLAUSES.len(),
                parts.len()
            )));
        }

        let mut codes: Option<BTreeSet<String>> = None;
        for (part, (open, close)) in parts.iter().zip(CLAUSES.iter()) {
            let condition = part
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
                .ok_or_else(|| {
                    RefinerError::QueryEvaluation(format!("unexpected clause '{part}'"))
                })?;
            let parsed = parse_condition(condition)?;
            match &codes {
                Some(existing) if *existing != parsed => {
                    return Err(RefinerError::QueryEvaluation(
                        "union clauses test different code sets".to_string(),
                    ))
                }
                Some(_) => {}
                None => codes = Some(parsed),
            }
        }

        match codes {
            Some(set) if !set.is_empty() => Ok(Predicate::AnyCode(set)),
            _ => Err(RefinerError::QueryEvaluation("query tests no codes".to_string())),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query())
    }
}

/// XPath 1.0 string literal; `concat()` when both quote kinds occur
fn quote(code: &str) -> String {
    if !code.contains('\'') {
        format!("'{code}'")
    } else if !code.contains('"') {
        format!("\"{code}\"")
    } else {
        let mut args = Vec::new();
        for (index, piece) in code.split('\'').enumerate() {
            if index > 0 {
                args.push("\"'\"".to_string());
            }
            if !piece.is_empty() {
                args.push(format!("'{piece}'"));
            }
        }
        format!("concat({})", args.join(", "))
    }
}

/// Splits a union on `|` outside string literals
fn split_union(query: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in query.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '|') => {
                parts.push(query[start..index].trim());
                start = index + 1;
            }
            (None, _) => {}
        }
    }
    parts.push(query[start..].trim());
    parts
}

/// Reads one quoted literal, returning it and the remaining text
fn quoted(text: &str) -> Option<(&str, &str)> {
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &text[1..];
    let end = body.find(quote)?;
    Some((&body[..end], &body[end + 1..]))
}

/// Reads a quoted literal or a `concat()` of quoted literals
fn literal(text: &str) -> std::result::Result<(String, &str), &'static str> {
    let Some(mut rest) = text.strip_prefix("concat(") else {
        return quoted(text)
            .map(|(value, rest)| (value.to_string(), rest))
            .ok_or("expected a quoted literal");
    };

    let mut value = String::new();
    loop {
        let (piece, after) = quoted(rest.trim_start()).ok_or("malformed concat() argument")?;
        value.push_str(piece);
        let after = after.trim_start();
        if let Some(after) = after.strip_prefix(')') {
            return Ok((value, after));
        }
        rest = after.strip_prefix(',').ok_or("expected ',' or ')' in concat()")?;
    }
}

/// Parses `@code='a' or @code="b" ...`
fn parse_condition(condition: &str) -> Result<BTreeSet<String>> {
    let malformed = |detail: &str| {
        RefinerError::QueryEvaluation(format!("malformed code test '{condition}': {detail}"))
    };

    let mut codes = BTreeSet::new();
    let mut rest = condition.trim();
    loop {
        rest = rest
            .strip_prefix("@code=")
            .ok_or_else(|| malformed("expected @code="))?;
        let (code, after) = literal(rest).map_err(malformed)?;
        if code.trim().is_empty() {
            return Err(malformed("empty code literal"));
        }
        codes.insert(code);

        rest = after.trim_start();
        if rest.is_empty() {
            return Ok(codes);
        }
        rest = rest
            .strip_prefix("or ")
            .ok_or_else(|| malformed("expected 'or'"))?
            .trim_start();
    }
}
