//! Deduplicator - collapses exact and near-duplicate reporting
//!
//! Exact duplicates share a record id (same category + natural key). Fuzzy
//! duplicates are independent writeups of the same event: same category,
//! same country, close in time, high token-set similarity. Corroboration
//! raises confidence; the fuzzy bonus is smaller than the exact one.
//!
//! The merge is commutative and idempotent. A record that adds nothing new
//! over what is already held (no higher confidence, no longer summary, no
//! new fields) is subsumed and the merge is a no-op, so re-running a merge
//! never inflates confidence.

use std::collections::HashSet;
use tracing::debug;

use argus_core::{DedupConfig, IntelRecord, ThreatLevel, MAX_CONFIDENCE};
use argus_store::{IntelStore, RecordFilter, StoreError};

/// Sweep-level merge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub merged: usize,
    pub rejected: usize,
}

impl MergeOutcome {
    pub fn absorb(&mut self, other: MergeOutcome) {
        self.inserted += other.inserted;
        self.merged += other.merged;
        self.rejected += other.rejected;
    }
}

/// Token-set Jaccard similarity over lowercased alphanumeric tokens
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    };
    let set_a = tokens(a);
    let set_b = tokens(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Whether two records look like independent writeups of the same event
pub fn is_fuzzy_duplicate(a: &IntelRecord, b: &IntelRecord, config: &DedupConfig) -> bool {
    if a.category != b.category {
        return false;
    }
    let same_country = match (&a.country, &b.country) {
        (Some(ca), Some(cb)) => ca.eq_ignore_ascii_case(cb),
        _ => false,
    };
    if !same_country {
        return false;
    }
    let dt_hours = (a.collected_at - b.collected_at).num_seconds().abs() as f64 / 3600.0;
    if dt_hours > config.fuzzy_window_hours {
        return false;
    }
    token_set_similarity(&a.summary, &b.summary) >= config.fuzzy_similarity
}

/// The summary the merge keeps: longer wins, lexicographic min breaks ties
fn prefer_summary<'a>(a: &'a IntelRecord, b: &'a IntelRecord) -> &'a str {
    match a.summary.len().cmp(&b.summary.len()) {
        std::cmp::Ordering::Greater => &a.summary,
        std::cmp::Ordering::Less => &b.summary,
        std::cmp::Ordering::Equal => {
            if a.summary <= b.summary {
                &a.summary
            } else {
                &b.summary
            }
        }
    }
}

/// True when `b` contributes nothing `a` does not already hold
fn subsumes(a: &IntelRecord, b: &IntelRecord) -> bool {
    b.confidence <= a.confidence
        && prefer_summary(a, b) == a.summary
        && b.collected_at >= a.collected_at
        && b.threat_score <= a.threat_score
        && option_subsumed(&a.country, &b.country)
        && option_subsumed(&a.region, &b.region)
        && option_subsumed(&a.keyword, &b.keyword)
        && option_subsumed(&a.source_name, &b.source_name)
        && (b.coordinates.is_none() || a.coordinates.is_some())
}

fn option_subsumed(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (_, None) => true,
        (Some(va), Some(vb)) => va == vb,
        (None, Some(_)) => false,
    }
}

/// Total order used to pick the primary side of a merge deterministically
fn primary_first<'a>(
    a: &'a IntelRecord,
    b: &'a IntelRecord,
) -> (&'a IntelRecord, &'a IntelRecord) {
    let key = |r: &IntelRecord| (r.collected_at, r.id.clone());
    if key(a) <= key(b) {
        (a, b)
    } else {
        (b, a)
    }
}

/// Merge two records reporting the same underlying event.
///
/// Symmetric in its inputs. Confidence becomes `max(a, b) + bonus`, capped
/// at 1.0; `collected_at` is preserved from the first sighting; the longer
/// summary wins; missing attribution fields fill from the other side.
pub fn merge_records(a: &IntelRecord, b: &IntelRecord, bonus: f64) -> IntelRecord {
    if subsumes(a, b) {
        return a.clone();
    }
    if subsumes(b, a) {
        return b.clone();
    }

    let (first, second) = primary_first(a, b);
    let score = a.threat_score.max(b.threat_score);
    IntelRecord {
        id: first.id.clone(),
        collected_at: first.collected_at,
        category: first.category,
        summary: prefer_summary(a, b).to_string(),
        country: first.country.clone().or_else(|| second.country.clone()),
        region: first.region.clone().or_else(|| second.region.clone()),
        coordinates: first.coordinates.or(second.coordinates),
        keyword: first.keyword.clone().or_else(|| second.keyword.clone()),
        source_name: first
            .source_name
            .clone()
            .or_else(|| second.source_name.clone()),
        threat_level: ThreatLevel::from_score(score),
        threat_score: score,
        confidence: (a.confidence.max(b.confidence) + bonus).min(MAX_CONFIDENCE),
        raw_ref: first.raw_ref.clone(),
    }
}

/// Applies the dedup policy for a sweep batch against the store
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Collapse near-duplicates inside one batch before it touches the store
    pub fn collapse_batch(&self, incoming: Vec<IntelRecord>) -> (Vec<IntelRecord>, usize) {
        let mut collapsed: Vec<IntelRecord> = Vec::new();
        let mut merged_count = 0;

        'outer: for record in incoming {
            for held in collapsed.iter_mut() {
                if held.id == record.id {
                    *held = merge_records(held, &record, self.config.exact_bonus);
                    merged_count += 1;
                    continue 'outer;
                }
                if is_fuzzy_duplicate(held, &record, &self.config) {
                    let mut merged = merge_records(held, &record, self.config.fuzzy_bonus);
                    merged.id = held.id.clone();
                    *held = merged;
                    merged_count += 1;
                    continue 'outer;
                }
            }
            collapsed.push(record);
        }

        (collapsed, merged_count)
    }

    /// Merge a batch against store history. Exact hits merge in place; fuzzy
    /// hits collapse into the already-stored record (its id survives so no
    /// row is orphaned). The merged rows are staged and committed as a
    /// single batch write, so a failed write leaves the store untouched.
    pub fn merge_into_store(
        &self,
        store: &dyn IntelStore,
        incoming: Vec<IntelRecord>,
    ) -> Result<MergeOutcome, StoreError> {
        let mut outcome = MergeOutcome::default();
        let mut staged: Vec<IntelRecord> = Vec::new();

        for record in incoming {
            if let Some(existing) = store.get(&record.id)? {
                let merged = merge_records(&existing, &record, self.config.exact_bonus);
                if merged.collected_at > existing.collected_at.min(record.collected_at) {
                    return Err(StoreError::CollectedAtNotPreserved { id: record.id });
                }
                staged.push(merged);
                outcome.merged += 1;
                continue;
            }

            // Fuzzy scan over recent same-category history
            let window = chrono::Duration::seconds(
                (self.config.fuzzy_window_hours * 3600.0) as i64,
            );
            let filter = RecordFilter {
                category: Some(record.category),
                since: Some(record.collected_at - window),
                ..Default::default()
            };
            let candidates = store.query(&filter)?;
            if let Some(existing) = candidates
                .iter()
                .find(|c| is_fuzzy_duplicate(c, &record, &self.config))
            {
                let mut merged = merge_records(existing, &record, self.config.fuzzy_bonus);
                merged.id = existing.id.clone();
                debug!(
                    existing = %existing.id,
                    incoming = %record.id,
                    "fuzzy duplicate collapsed"
                );
                staged.push(merged);
                outcome.merged += 1;
                continue;
            }

            staged.push(record);
            outcome.inserted += 1;
        }

        store.put_all(staged)?;
        Ok(outcome)
    }
}
