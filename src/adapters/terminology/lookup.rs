//! Terminology lookup trait and grouper records
//!
//! A grouper record aggregates the clinical codes relevant to one reportable
//! condition. Services are inconsistent about how they encode the per-system
//! code lists, so the payloads are kept as raw JSON and decoded defensively
//! by [`GrouperRecord::codes`].

use crate::domain::{Code, CodeSystem, ConditionId, LookupError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Grouper record as returned by a terminology service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrouperRecord {
    /// Condition identifier the record belongs to
    #[serde(default)]
    pub condition: String,

    /// Condition display name
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub loinc_codes: Value,

    #[serde(default)]
    pub snomed_codes: Value,

    #[serde(default)]
    pub icd10_codes: Value,

    #[serde(default)]
    pub rxnorm_codes: Value,
}

impl GrouperRecord {
    /// Creates a record with no codes
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            display_name: None,
            loinc_codes: Value::Null,
            snomed_codes: Value::Null,
            icd10_codes: Value::Null,
            rxnorm_codes: Value::Null,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets one system's payload
    pub fn with_codes(mut self, system: CodeSystem, payload: Value) -> Self {
        *self.payload_mut(system) = payload;
        self
    }

    /// Raw payload for one code system
    pub fn payload(&self, system: CodeSystem) -> &Value {
        match system {
            CodeSystem::Loinc => &self.loinc_codes,
            CodeSystem::Snomed => &self.snomed_codes,
            CodeSystem::Icd10 => &self.icd10_codes,
            CodeSystem::RxNorm => &self.rxnorm_codes,
        }
    }

    fn payload_mut(&mut self, system: CodeSystem) -> &mut Value {
        match system {
            CodeSystem::Loinc => &mut self.loinc_codes,
            CodeSystem::Snomed => &mut self.snomed_codes,
            CodeSystem::Icd10 => &mut self.icd10_codes,
            CodeSystem::RxNorm => &mut self.rxnorm_codes,
        }
    }

    /// Decoded codes for one system
    ///
    /// A malformed payload yields an empty list and a warning; it never fails
    /// the record.
    pub fn codes(&self, system: CodeSystem) -> Vec<Code> {
        match decode_codes(system, self.payload(system)) {
            Ok(codes) => codes,
            Err(reason) => {
                tracing::warn!(
                    condition = %self.condition,
                    system = %system,
                    reason = %reason,
                    "Ignoring malformed grouper payload"
                );
                Vec::new()
            }
        }
    }
}

/// Decodes one per-system payload
///
/// Accepted shapes: `null`, an array, or a string holding JSON for either.
/// Array items are objects with `code`/`display`, `[code, display]` pairs or
/// bare code strings. Items without a code are dropped; any other item shape
/// makes the whole payload malformed.
pub fn decode_codes(system: CodeSystem, payload: &Value) -> Result<Vec<Code>, String> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::String(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Value::String(raw) => {
            let parsed: Value = serde_json::from_str(raw)
                .map_err(|e| format!("embedded JSON does not parse: {e}"))?;
            match parsed {
                Value::Array(items) => decode_items(system, &items),
                Value::Null => Ok(Vec::new()),
                other => Err(format!("expected an array, found {}", kind(&other))),
            }
        }
        Value::Array(items) => decode_items(system, items),
        other => Err(format!("expected an array, found {}", kind(other))),
    }
}

fn decode_items(system: CodeSystem, items: &[Value]) -> Result<Vec<Code>, String> {
    let mut codes = Vec::with_capacity(items.len());
    for item in items {
        let (code, display) = match item {
            Value::Object(map) => (
                map.get("code").and_then(scalar_text),
                map.get("display").and_then(scalar_text),
            ),
            Value::Array(pair) => (
                pair.first().and_then(scalar_text),
                pair.get(1).and_then(scalar_text),
            ),
            Value::String(code) => (Some(code.clone()), None),
            other => return Err(format!("unexpected {} in code list", kind(other))),
        };

        let Some(code) = code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) else {
            continue;
        };

        let mut entry = Code::new(system.uri(), code);
        if let Some(display) = display.filter(|d| !d.trim().is_empty()) {
            entry = entry.with_display(display);
        }
        codes.push(entry);
    }
    Ok(codes)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Source of condition grouper records
///
/// Implementations are shared across concurrent lookups, so they must be
/// `Send + Sync` and hold no lock across an await.
#[async_trait]
pub trait TerminologyLookup: Send + Sync {
    /// Fetches the grouper record for one condition
    ///
    /// # Errors
    ///
    /// - [`LookupError::NotFound`] when the condition has no grouper
    /// - [`LookupError::Connection`] for transport failures
    /// - [`LookupError::InvalidResponse`] for undecodable replies
    /// - [`LookupError::Unavailable`] when the service cannot be used at all
    async fn lookup_grouper(&self, condition: &ConditionId) -> Result<GrouperRecord, LookupError>;

    /// Short name for logs
    fn name(&self) -> &str;
}
