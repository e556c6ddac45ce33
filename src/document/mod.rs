//! eICR/RR document model
//!
//! A [`Document`] owns the source text of an eICR and its optional RR. Each
//! half is parsed on access into a fresh [`XmlTree`]; parsing has no side
//! effects, so a refinement can always start from a clean tree and several
//! refinements of the same document never share one.

pub mod cda;
pub mod tree;

pub use cda::{detect_version, find_structured_body, EicrVersion, HL7_NS};
pub use tree::{Element, Node, XmlTree};

use crate::domain::{RefinerError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// An eICR with its accompanying Reportability Response
#[derive(Debug, Clone)]
pub struct Document {
    eicr: String,
    rr: Option<String>,
}

impl Document {
    pub fn new(eicr: impl Into<String>, rr: Option<String>) -> Self {
        Self {
            eicr: eicr.into(),
            rr,
        }
    }

    /// Builds a document from raw bytes, decoding each half with [`decode_text`]
    pub fn from_bytes(eicr: &[u8], rr: Option<&[u8]>) -> Self {
        Self {
            eicr: decode_text(eicr),
            rr: rr.map(decode_text),
        }
    }

    pub fn eicr_source(&self) -> &str {
        &self.eicr
    }

    pub fn rr_source(&self) -> Option<&str> {
        self.rr.as_deref()
    }

    pub fn has_rr(&self) -> bool {
        self.rr.is_some()
    }

    /// Parses the eICR half
    pub fn parse_eicr(&self) -> Result<XmlTree> {
        XmlTree::parse(&self.eicr)
    }

    /// Parses the RR half
    ///
    /// # Errors
    ///
    /// [`RefinerError::Structure`] when the document carries no RR, otherwise
    /// whatever [`XmlTree::parse`] reports.
    pub fn parse_rr(&self) -> Result<XmlTree> {
        let rr = self
            .rr
            .as_deref()
            .ok_or_else(|| RefinerError::Structure("document has no RR".to_string()))?;
        XmlTree::parse(rr)
    }
}

/// Best-effort text decoding for document bytes
///
/// Strips a UTF-8 byte order mark, then decodes as UTF-8. Input that is not
/// valid UTF-8 is read as Latin-1, which never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!(
                valid_up_to = e.valid_up_to(),
                "Document is not valid UTF-8, decoding as Latin-1"
            );
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}
