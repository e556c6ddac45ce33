//! Code-set resolution
//!
//! Turns condition identifiers into the union of the clinical codes their
//! groupers aggregate. One failed lookup never sinks the whole resolution:
//! it is logged, recorded in [`Resolution::skipped`] and the remaining
//! conditions still resolve. Only an unavailable terminology capability
//! propagates.

use crate::adapters::terminology::{GrouperRecord, TerminologyLookup};
use crate::domain::{Code, CodeSystem, ConditionId, LookupError, RefinerError, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Codes aggregated from one condition's grouper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGrouper {
    condition: ConditionId,
    display_name: Option<String>,
    codes: BTreeSet<Code>,
}

impl ResolvedGrouper {
    /// Aggregates the four code systems of a grouper record
    pub fn from_record(condition: ConditionId, record: &GrouperRecord) -> Self {
        let codes = CodeSystem::ALL
            .into_iter()
            .flat_map(|system| record.codes(system))
            .collect();
        Self {
            condition,
            display_name: record
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty()),
            codes,
        }
    }

    pub fn condition(&self) -> &ConditionId {
        &self.condition
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn codes(&self) -> &BTreeSet<Code> {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Outcome of resolving a set of conditions
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Groupers that resolved, in request order
    pub groupers: Vec<ResolvedGrouper>,

    /// Conditions whose lookup failed, with the reason
    pub skipped: Vec<(ConditionId, LookupError)>,
}

impl Resolution {
    /// Union of every resolved grouper's codes
    pub fn codes(&self) -> BTreeSet<Code> {
        self.groupers
            .iter()
            .flat_map(|g| g.codes().iter().cloned())
            .collect()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &ConditionId> {
        self.groupers.iter().map(ResolvedGrouper::condition)
    }

    /// `true` when at least one condition was requested and none resolved
    pub fn all_failed(&self) -> bool {
        self.groupers.is_empty() && !self.skipped.is_empty()
    }
}

/// Resolves condition identifiers through a [`TerminologyLookup`]
#[derive(Clone)]
pub struct CodeSetResolver {
    lookup: Arc<dyn TerminologyLookup>,
}

impl CodeSetResolver {
    pub fn new(lookup: Arc<dyn TerminologyLookup>) -> Self {
        Self { lookup }
    }

    /// Resolves every distinct condition concurrently
    ///
    /// # Errors
    ///
    /// [`RefinerError::Lookup`] only when the terminology capability reports
    /// itself unavailable.
    pub async fn resolve(&self, conditions: &[ConditionId]) -> Result<Resolution> {
        let mut seen = HashSet::new();
        let unique: Vec<&ConditionId> = conditions.iter().filter(|c| seen.insert(*c)).collect();

        let lookups = unique.iter().map(|condition| self.lookup.lookup_grouper(condition));
        let results = join_all(lookups).await;

        let mut resolution = Resolution::default();
        for (condition, result) in unique.into_iter().zip(results) {
            match result {
                Ok(record) => {
                    let grouper = ResolvedGrouper::from_record(condition.clone(), &record);
                    tracing::debug!(
                        condition = %condition,
                        codes = grouper.len(),
                        "Resolved grouper"
                    );
                    resolution.groupers.push(grouper);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(
                        condition = %condition,
                        source = self.lookup.name(),
                        error = %e,
                        "Skipping condition whose grouper could not be resolved"
                    );
                    resolution.skipped.push((condition.clone(), e));
                }
                Err(e) => return Err(RefinerError::Lookup(e)),
            }
        }

        if resolution.all_failed() {
            tracing::warn!(
                requested = resolution.skipped.len(),
                "No grouper could be resolved; refinement will match nothing"
            );
        }

        Ok(resolution)
    }
}
