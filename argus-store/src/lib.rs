//! Store boundary for ARGUS
//!
//! The engine's only persistence dependency. The [`IntelStore`] trait is the
//! whole contract: any embedded engine that satisfies it can hold the
//! records. This crate ships an in-memory reference engine with
//! single-writer/multiple-reader locking plus JSON/CSV export and JSON
//! import for the round-trip guarantee.

pub mod export;
pub mod memory;

pub use export::*;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use argus_core::{IntelCategory, IntelRecord, ThreatLevel};

/// Persistence failure; fatal for the current write, retried once upstream
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {id} violates the score/level banding invariant (score {score}, level {level})")]
    BandingViolation {
        id: String,
        score: f64,
        level: ThreatLevel,
    },

    #[error("record {id} has confidence {confidence} outside [0, 1]")]
    ConfidenceViolation { id: String, confidence: f64 },

    #[error("merge for {id} does not preserve the earliest collected_at")]
    CollectedAtNotPreserved { id: String },

    #[error("storage engine failure: {0}")]
    Engine(String),
}

/// Whether a write landed as a fresh insert or collapsed into an existing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDisposition {
    Inserted(String),
    Merged(String),
}

impl MergeDisposition {
    pub fn id(&self) -> &str {
        match self {
            MergeDisposition::Inserted(id) | MergeDisposition::Merged(id) => id,
        }
    }
}

/// Query filter over the store; all clauses are conjunctive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    pub category: Option<IntelCategory>,
    /// Substring match against country, summary, or keyword
    pub scope: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub min_score: Option<f64>,
}

impl RecordFilter {
    pub fn matches(&self, record: &IntelRecord) -> bool {
        if let Some(category) = self.category {
            if record.category != category {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.collected_at < since {
                return false;
            }
        }
        if let Some(min_score) = self.min_score {
            if record.threat_score < min_score {
                return false;
            }
        }
        if let Some(scope) = &self.scope {
            let needle = scope.to_lowercase();
            let hit = record
                .country
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle))
                || record.summary.to_lowercase().contains(&needle)
                || record
                    .keyword
                    .as_deref()
                    .is_some_and(|k| k.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Durable keyed collection of Intel Records.
///
/// Writes must reject records that violate the core invariants: the banding
/// of `threat_score` must match `threat_level`, and `confidence` must stay
/// in [0, 1]. Offending writes abort and surface, never silently corrected.
pub trait IntelStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<IntelRecord>, StoreError>;

    /// Validated insert-or-replace. Callers use [`IntelStore::insert_or_merge`]
    /// for the normal write path.
    fn put(&self, record: IntelRecord) -> Result<String, StoreError>;

    /// Apply a batch of writes as one unit: every record lands or none do.
    /// This is the commit path for a sweep's per-adapter batch.
    fn put_all(&self, records: Vec<IntelRecord>) -> Result<(), StoreError>;

    fn query(&self, filter: &RecordFilter) -> Result<Vec<IntelRecord>, StoreError>;

    fn all(&self) -> Result<Vec<IntelRecord>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    /// Insert a record, or collapse it into an existing record with the same
    /// id using the supplied merge policy. The merge must preserve the
    /// earliest `collected_at`; the write is rejected otherwise.
    fn insert_or_merge(
        &self,
        record: IntelRecord,
        merge: &dyn Fn(&IntelRecord, &IntelRecord) -> IntelRecord,
    ) -> Result<MergeDisposition, StoreError> {
        match self.get(&record.id)? {
            Some(existing) => {
                let merged = merge(&existing, &record);
                if merged.collected_at > existing.collected_at.min(record.collected_at) {
                    return Err(StoreError::CollectedAtNotPreserved { id: record.id });
                }
                let id = self.put(merged)?;
                Ok(MergeDisposition::Merged(id))
            }
            None => {
                let id = self.put(record)?;
                Ok(MergeDisposition::Inserted(id))
            }
        }
    }
}

/// Shared invariant check used by store engines on every write
pub fn validate_write(record: &IntelRecord) -> Result<(), StoreError> {
    if !record.banding_consistent() {
        return Err(StoreError::BandingViolation {
            id: record.id.clone(),
            score: record.threat_score,
            level: record.threat_level,
        });
    }
    if !(0.0..=1.0).contains(&record.confidence) {
        return Err(StoreError::ConfidenceViolation {
            id: record.id.clone(),
            confidence: record.confidence,
        });
    }
    Ok(())
}
