//! Sweep runner
//!
//! One collection pass across the source adapters. Collection is
//! embarrassingly parallel - adapters share no mutable state and suspend
//! only on I/O - while normalization, dedup, and the store commit run
//! serialized so ids and merges see a consistent view. Each adapter's batch
//! commits as a unit; one adapter failing never touches another's batch.

use futures::future::join_all;
use std::time::Duration;
use tracing::{info, warn};

use argus_core::{EngineConfig, IntelRecord};
use argus_store::{IntelStore, StoreError};

use crate::{CollectParams, Deduplicator, MergeOutcome, RawItem, SourceAdapter};

/// Backoff before the single store-write retry
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// What one sweep did, per adapter and in total
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub outcome: MergeOutcome,
    /// Adapters whose batch was skipped, with the reason
    pub adapter_failures: Vec<(String, String)>,
    /// Raw items collected across all successful adapters
    pub collected: usize,
}

impl SweepSummary {
    pub fn clean(&self) -> bool {
        self.adapter_failures.is_empty()
    }
}

/// Runs collection sweeps against a store
pub struct Sweep {
    dedup: Deduplicator,
}

impl Sweep {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            dedup: Deduplicator::new(config.dedup.clone()),
        }
    }

    /// Run one sweep: collect from every adapter concurrently, then
    /// normalize, score, deduplicate, and commit batch by batch.
    ///
    /// `score` derives the threat fields before anything reaches the store;
    /// it is injected so the read-side scorer stays the single owner of
    /// scoring policy.
    pub async fn run(
        &self,
        adapters: &[Box<dyn SourceAdapter>],
        store: &dyn IntelStore,
        params: &CollectParams,
        score: &(dyn Fn(&mut IntelRecord) + Sync),
    ) -> SweepSummary {
        let mut summary = SweepSummary::default();

        let batches = join_all(adapters.iter().map(|adapter| async move {
            (adapter.name().to_string(), adapter.collect(params).await)
        }))
        .await;

        // The full tasking lands on each record, not just the lead keyword
        let keyword = if params.keywords.is_empty() {
            None
        } else {
            Some(params.keywords.join(", "))
        };

        for (name, batch) in batches {
            match batch {
                Ok(items) => {
                    summary.collected += items.len();
                    match self
                        .commit_batch(store, &name, &items, keyword.as_deref(), score)
                        .await
                    {
                        Ok(outcome) => summary.outcome.absorb(outcome),
                        Err(e) => {
                            warn!(adapter = %name, error = %e, "batch commit failed");
                            summary.adapter_failures.push((name, e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    warn!(adapter = %name, error = %e, "adapter unreachable, batch skipped");
                    summary.adapter_failures.push((name, e.to_string()));
                }
            }
        }

        info!(
            collected = summary.collected,
            inserted = summary.outcome.inserted,
            merged = summary.outcome.merged,
            rejected = summary.outcome.rejected,
            failures = summary.adapter_failures.len(),
            "sweep complete"
        );
        summary
    }

    async fn commit_batch(
        &self,
        store: &dyn IntelStore,
        adapter: &str,
        items: &[RawItem],
        keyword: Option<&str>,
        score: &(dyn Fn(&mut IntelRecord) + Sync),
    ) -> Result<MergeOutcome, StoreError> {
        let mut records = Vec::with_capacity(items.len());
        let mut rejected = 0;

        for item in items {
            match crate::normalize(item, keyword) {
                Ok(mut record) => {
                    score(&mut record);
                    records.push(record);
                }
                Err(e) => {
                    rejected += 1;
                    warn!(adapter, error = %e, "raw item rejected");
                }
            }
        }

        let (collapsed, pre_merged) = self.dedup.collapse_batch(records);

        // One retry with backoff before the batch is surfaced as failed
        let mut outcome = match self.dedup.merge_into_store(store, collapsed.clone()) {
            Ok(outcome) => outcome,
            Err(first) => {
                warn!(adapter, error = %first, "store write failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.dedup.merge_into_store(store, collapsed)?
            }
        };

        outcome.merged += pre_merged;
        outcome.rejected += rejected;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticAdapter;
    use argus_core::ThreatLevel;
    use argus_store::MemoryStore;
    use async_trait::async_trait;

    struct DownAdapter;

    #[async_trait]
    impl SourceAdapter for DownAdapter {
        fn name(&self) -> &str {
            "down-feed"
        }

        async fn collect(&self, _params: &CollectParams) -> Result<Vec<RawItem>, crate::AdapterError> {
            Err(crate::AdapterError::Unreachable("connection refused".into()))
        }
    }

    fn flat_score(record: &mut IntelRecord) {
        record.threat_score = 10.0;
        record.threat_level = ThreatLevel::from_score(10.0);
    }

    fn news(url: &str, title: &str) -> RawItem {
        RawItem::News {
            url: url.into(),
            title: title.into(),
            body: String::new(),
            source: None,
            country: Some("Ukraine".into()),
        }
    }

    #[tokio::test]
    async fn test_failed_adapter_does_not_poison_sweep() {
        let store = MemoryStore::new();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StaticAdapter::new(
                "wire",
                vec![news("https://example.com/a", "Strikes reported")],
            )),
            Box::new(DownAdapter),
        ];

        let sweep = Sweep::new(&EngineConfig::default());
        let summary = sweep
            .run(&adapters, &store, &CollectParams::default(), &flat_score)
            .await;

        assert_eq!(summary.outcome.inserted, 1);
        assert_eq!(summary.adapter_failures.len(), 1);
        assert_eq!(summary.adapter_failures[0].0, "down-feed");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_items_counted_not_fatal() {
        let store = MemoryStore::new();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(StaticAdapter::new(
            "mixed",
            vec![
                news("https://example.com/a", "Strikes reported"),
                RawItem::Cyber {
                    cve_id: None,
                    malware: None,
                    title: "unattributed".into(),
                    description: String::new(),
                    vendor: None,
                },
            ],
        ))];

        let sweep = Sweep::new(&EngineConfig::default());
        let summary = sweep
            .run(&adapters, &store, &CollectParams::default(), &flat_score)
            .await;

        assert_eq!(summary.outcome.inserted, 1);
        assert_eq!(summary.outcome.rejected, 1);
        assert!(summary.clean());
    }

    #[tokio::test]
    async fn test_full_tasking_recorded_on_records() {
        let store = MemoryStore::new();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(StaticAdapter::new(
            "wire",
            vec![news("https://example.com/a", "Strikes reported")],
        ))];

        let params = CollectParams {
            keywords: vec!["ukraine".into(), "drone strikes".into()],
            limit: 0,
        };
        let sweep = Sweep::new(&EngineConfig::default());
        sweep.run(&adapters, &store, &params, &flat_score).await;

        let records = store.all().unwrap();
        assert_eq!(records[0].keyword.as_deref(), Some("ukraine, drone strikes"));
    }

    #[tokio::test]
    async fn test_resweep_is_idempotent() {
        let store = MemoryStore::new();
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(StaticAdapter::new(
            "wire",
            vec![news("https://example.com/a", "Strikes reported")],
        ))];

        let sweep = Sweep::new(&EngineConfig::default());
        let params = CollectParams::default();
        sweep.run(&adapters, &store, &params, &flat_score).await;
        let second = sweep.run(&adapters, &store, &params, &flat_score).await;

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(second.outcome.inserted, 0);
        assert_eq!(second.outcome.merged, 1);
    }
}
