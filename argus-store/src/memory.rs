//! In-memory reference store engine
//!
//! Single writer, multiple readers: all mutation goes through one write
//! lock, so a sweep's batch commit can never interleave with another
//! writer's rows.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use argus_core::IntelRecord;

use crate::{validate_write, IntelStore, RecordFilter, StoreError};

/// HashMap-backed store behind a `parking_lot::RwLock`
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, IntelRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntelStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<IntelRecord>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn put(&self, record: IntelRecord) -> Result<String, StoreError> {
        validate_write(&record)?;
        let id = record.id.clone();
        self.records.write().insert(id.clone(), record);
        debug!(id = %id, "record written");
        Ok(id)
    }

    fn put_all(&self, records: Vec<IntelRecord>) -> Result<(), StoreError> {
        for record in &records {
            validate_write(record)?;
        }
        let mut map = self.records.write();
        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(())
    }

    fn query(&self, filter: &RecordFilter) -> Result<Vec<IntelRecord>, StoreError> {
        let mut hits: Vec<IntelRecord> = self
            .records
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        Ok(hits)
    }

    fn all(&self) -> Result<Vec<IntelRecord>, StoreError> {
        let mut records: Vec<IntelRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{IntelCategory, ThreatLevel};

    fn scored(natural_key: &str, score: f64) -> IntelRecord {
        let mut record =
            IntelRecord::new(IntelCategory::News, natural_key, format!("item {natural_key}"), 0.6);
        record.threat_score = score;
        record.threat_level = ThreatLevel::from_score(score);
        record
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        let record = scored("https://example.com/a", 45.0);
        let id = store.put(record.clone()).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().summary, record.summary);
    }

    #[test]
    fn test_banding_violation_rejected() {
        let store = MemoryStore::new();
        let mut record = scored("https://example.com/a", 45.0);
        record.threat_level = ThreatLevel::Critical; // inconsistent with 45.0
        assert!(matches!(
            store.put(record),
            Err(StoreError::BandingViolation { .. })
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_confidence_violation_rejected() {
        let store = MemoryStore::new();
        let mut record = scored("https://example.com/a", 45.0);
        record.confidence = 1.2;
        assert!(matches!(
            store.put(record),
            Err(StoreError::ConfidenceViolation { .. })
        ));
    }

    #[test]
    fn test_query_filters_compose() {
        let store = MemoryStore::new();
        let mut a = scored("https://example.com/a", 70.0);
        a.country = Some("Ukraine".into());
        let mut b = scored("https://example.com/b", 10.0);
        b.country = Some("Ukraine".into());
        store.put(a).unwrap();
        store.put(b).unwrap();

        let filter = RecordFilter {
            scope: Some("ukraine".into()),
            min_score: Some(50.0),
            ..Default::default()
        };
        let hits = store.query(&filter).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].threat_score, 70.0);
    }

    #[test]
    fn test_put_all_is_all_or_nothing() {
        let store = MemoryStore::new();
        let good = scored("https://example.com/a", 45.0);
        let mut bad = scored("https://example.com/b", 45.0);
        bad.threat_level = ThreatLevel::Critical; // inconsistent with 45.0

        assert!(store.put_all(vec![good, bad]).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_or_merge_dispositions() {
        let store = MemoryStore::new();
        let record = scored("https://example.com/a", 45.0);
        let keep_old = |old: &IntelRecord, _new: &IntelRecord| old.clone();

        let first = store.insert_or_merge(record.clone(), &keep_old).unwrap();
        assert!(matches!(first, crate::MergeDisposition::Inserted(_)));

        let second = store.insert_or_merge(record, &keep_old).unwrap();
        assert!(matches!(second, crate::MergeDisposition::Merged(_)));
        assert_eq!(store.count().unwrap(), 1);
    }
}
