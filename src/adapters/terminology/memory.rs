//! In-memory grouper store
//!
//! Serves grouper records from a map, optionally loaded from a JSON file
//! holding an array of records. Used for offline runs and tests.

use super::{GrouperRecord, TerminologyLookup};
use crate::domain::{ConditionId, LookupError, RefinerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTerminology {
    groupers: HashMap<String, GrouperRecord>,
}

impl InMemoryTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, keyed by its condition
    pub fn with_grouper(mut self, record: GrouperRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&mut self, record: GrouperRecord) {
        self.groupers.insert(record.condition.trim().to_string(), record);
    }

    pub fn len(&self) -> usize {
        self.groupers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groupers.is_empty()
    }

    /// Parses a JSON array of grouper records
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<GrouperRecord> = serde_json::from_str(json).map_err(|e| {
            RefinerError::Configuration(format!("Invalid groupers file: {e}"))
        })?;

        let mut store = Self::new();
        for record in records {
            if record.condition.trim().is_empty() {
                return Err(RefinerError::Configuration(
                    "Grouper record without a condition".to_string(),
                ));
            }
            store.insert(record);
        }
        Ok(store)
    }

    /// Loads a JSON groupers file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RefinerError::Configuration(format!(
                "Failed to read groupers file {}: {}",
                path.display(),
                e
            ))
        })?;
        let store = Self::from_json_str(&contents)?;
        tracing::info!(path = %path.display(), groupers = store.len(), "Loaded groupers file");
        Ok(store)
    }
}

#[async_trait]
impl TerminologyLookup for InMemoryTerminology {
    async fn lookup_grouper(
        &self,
        condition: &ConditionId,
    ) -> std::result::Result<GrouperRecord, LookupError> {
        self.groupers
            .get(condition.as_str())
            .cloned()
            .ok_or_else(|| LookupError::NotFound(condition.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
