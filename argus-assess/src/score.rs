//! Threat scorer
//!
//! Per-record score = category base weight + severity-keyword signal +
//! indicator signal, clamped to [0, 100]; the stored level is always the
//! banding of the stored score. Confidence never changes the stored score -
//! it dampens a record's contribution (`effective = score * confidence`)
//! when ranking and aggregating.
//!
//! The aggregate per scope is a decayed, confidence-weighted mean with
//! exponential time decay, so posture reflects what is happening now, not
//! what accumulated last month. No hidden randomness: identical record sets
//! and window always produce the same number.

use chrono::{DateTime, Utc};

use argus_core::{indicator_signal, IntelCategory, IntelRecord, ScoringConfig, ThreatLevel};

/// High-severity terms; each distinct hit adds `keyword_boost`
const SEVERITY_TERMS: &[&str] = &[
    "attack",
    "strike",
    "missile",
    "explosion",
    "invasion",
    "casualties",
    "nuclear",
    "mobilization",
    "offensive",
    "shelling",
    "blockade",
    "incursion",
    "hostage",
    "ransomware",
    "zero-day",
    "exploit",
    "breach",
    "malware",
    "wiper",
    "botnet",
];

/// Distinct severity hits counted beyond this add nothing
const MAX_KEYWORD_HITS: usize = 4;

/// Distinct indicator hits counted beyond this add nothing
const MAX_INDICATOR_HITS: usize = 5;

/// Base weight per category: hard-sensor and cyber domains outrank chatter
fn category_base(category: IntelCategory) -> f64 {
    match category {
        IntelCategory::Cyber => 35.0,
        IntelCategory::AirTrack => 30.0,
        IntelCategory::MaritimeTrack => 25.0,
        IntelCategory::Imagery => 20.0,
        IntelCategory::News => 15.0,
        IntelCategory::Social => 8.0,
    }
}

/// Derives threat scores and aggregates
#[derive(Debug, Clone)]
pub struct ThreatScorer {
    config: ScoringConfig,
}

impl ThreatScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a single record and return the matching level
    pub fn score(&self, record: &IntelRecord) -> (f64, ThreatLevel) {
        let text = record.summary.to_lowercase();
        let keyword_hits = SEVERITY_TERMS
            .iter()
            .filter(|term| text.contains(*term))
            .count()
            .min(MAX_KEYWORD_HITS);
        let indicator_hits = indicator_signal(&record.summary).min(MAX_INDICATOR_HITS);

        let raw = category_base(record.category)
            + keyword_hits as f64 * self.config.keyword_boost
            + indicator_hits as f64 * self.config.indicator_boost;
        let score = raw.clamp(argus_core::MIN_SCORE, argus_core::MAX_SCORE);
        (score, ThreatLevel::from_score(score))
    }

    /// Score a record in place, keeping score and level consistent
    pub fn apply(&self, record: &mut IntelRecord) {
        let (score, level) = self.score(record);
        record.threat_score = score;
        record.threat_level = level;
    }

    /// Decayed, confidence-weighted mean over a scope's records.
    ///
    /// Weight of a record = confidence * exp(-decay_rate * age_hours).
    /// Records are folded in id order so the result is invariant under
    /// input reordering.
    pub fn aggregate(&self, records: &[IntelRecord], now: DateTime<Utc>) -> f64 {
        if records.is_empty() {
            return 0.0;
        }

        let mut ordered: Vec<&IntelRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for record in ordered {
            let age_hours = (now - record.collected_at).num_seconds().max(0) as f64 / 3600.0;
            let decay = (-self.config.decay_rate * age_hours).exp();
            let weight = record.confidence * decay;
            weighted_sum += record.threat_score * weight;
            weight_sum += weight;
        }

        if weight_sum <= f64::EPSILON {
            0.0
        } else {
            weighted_sum / weight_sum
        }
    }
}

impl Default for ThreatScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(category: IntelCategory, summary: &str, confidence: f64) -> IntelRecord {
        IntelRecord::new(category, summary, summary.to_string(), confidence)
    }

    #[test]
    fn test_cyber_outranks_social_chatter() {
        let scorer = ThreatScorer::default();
        let (cyber, _) = scorer.score(&record(
            IntelCategory::Cyber,
            "ransomware exploit against CVE-2024-3400",
            0.9,
        ));
        let (social, _) = scorer.score(&record(
            IntelCategory::Social,
            "ransomware exploit against CVE-2024-3400",
            0.4,
        ));
        assert!(cyber > social);
    }

    #[test]
    fn test_score_level_always_consistent() {
        let scorer = ThreatScorer::default();
        let summaries = [
            "routine port call",
            "missile strike, casualties reported after the attack",
            "active exploit of CVE-2024-3400, ransomware deployed, breach confirmed",
        ];
        for summary in summaries {
            for category in IntelCategory::ALL {
                let mut r = record(category, summary, 0.7);
                scorer.apply(&mut r);
                assert!(r.banding_consistent(), "inconsistent for {summary}");
                assert!((0.0..=100.0).contains(&r.threat_score));
            }
        }
    }

    #[test]
    fn test_keyword_hits_capped() {
        let scorer = ThreatScorer::default();
        let (score, _) = scorer.score(&record(
            IntelCategory::News,
            "attack strike missile explosion invasion casualties nuclear offensive",
            0.6,
        ));
        // 15 base + 4 capped hits * 10
        assert_eq!(score, 55.0);
    }

    #[test]
    fn test_aggregate_order_independent() {
        let scorer = ThreatScorer::default();
        let now = Utc::now();
        let mut records = Vec::new();
        for i in 0..6 {
            let mut r = record(IntelCategory::News, &format!("item {i}"), 0.4 + i as f64 * 0.1);
            r.threat_score = 10.0 * i as f64;
            r.collected_at = now - Duration::hours(i);
            records.push(r);
        }

        let forward = scorer.aggregate(&records, now);
        records.reverse();
        let backward = scorer.aggregate(&records, now);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_aggregate_decays_old_records() {
        let scorer = ThreatScorer::default();
        let now = Utc::now();

        let mut fresh_high = record(IntelCategory::News, "a", 0.8);
        fresh_high.threat_score = 90.0;
        fresh_high.collected_at = now;

        let mut stale_low = record(IntelCategory::News, "b", 0.8);
        stale_low.threat_score = 10.0;
        stale_low.collected_at = now - Duration::hours(96);

        let aggregate = scorer.aggregate(&[fresh_high, stale_low], now);
        // The 96h-old record has decayed to near nothing
        assert!(aggregate > 85.0, "aggregate was {aggregate}");
    }

    #[test]
    fn test_aggregate_deterministic_and_empty_safe() {
        let scorer = ThreatScorer::default();
        let now = Utc::now();
        assert_eq!(scorer.aggregate(&[], now), 0.0);

        let mut r = record(IntelCategory::Cyber, "exploit", 0.9);
        r.threat_score = 60.0;
        let records = vec![r];
        assert_eq!(scorer.aggregate(&records, now), scorer.aggregate(&records, now));
    }
}
