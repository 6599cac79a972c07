//! Engine configuration
//!
//! Every policy number the engine depends on lives here: dedup similarity
//! and corroboration bonuses, aggregate decay, alert thresholds and dwell,
//! synthesizer bounds. Invalid configuration is fatal at startup, never
//! silently defaulted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid thresholds or weights; fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("alert thresholds must be strictly ascending, got {0:?}")]
    NonMonotonicThresholds([f64; 4]),

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

/// Deduplication policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Confidence bonus when the same id is re-seen from another sweep
    pub exact_bonus: f64,
    /// Smaller bonus for fuzzy (different natural key) corroboration
    pub fuzzy_bonus: f64,
    /// Token-set similarity threshold for fuzzy matches
    pub fuzzy_similarity: f64,
    /// Max temporal distance for fuzzy matches, in hours
    pub fuzzy_window_hours: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            exact_bonus: 0.1,
            fuzzy_bonus: 0.05,
            fuzzy_similarity: 0.85,
            fuzzy_window_hours: 6.0,
        }
    }
}

/// Threat scoring policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Exponential decay rate per hour for the aggregate
    pub decay_rate: f64,
    /// Per-indicator boost added to a record's raw score
    pub indicator_boost: f64,
    /// Per-severity-keyword boost
    pub keyword_boost: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.05,
            indicator_boost: 8.0,
            keyword_boost: 10.0,
        }
    }
}

/// Alert-level resolver policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Aggregate-score thresholds for levels 4, 3, 2, 1 (ascending)
    pub thresholds: [f64; 4],
    /// Hours the aggregate must stay below a threshold before downgrading
    pub dwell_hours: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            thresholds: [30.0, 50.0, 70.0, 85.0],
            dwell_hours: 2.0,
        }
    }
}

/// Assessment synthesizer bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Max records included in one section prompt
    pub max_records_per_section: usize,
    /// Hard timeout per pipeline stage, in seconds
    pub stage_timeout_secs: u64,
    /// Max characters of a record summary quoted into a prompt
    pub summary_truncate: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_records_per_section: 20,
            stage_timeout_secs: 120,
            summary_truncate: 400,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dedup: DedupConfig,
    pub scoring: ScoringConfig,
    pub alert: AlertConfig,
    pub synthesis: SynthesisConfig,
}

impl EngineConfig {
    /// Validate all policy numbers; called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("dedup.exact_bonus", self.dedup.exact_bonus, 0.0, 1.0)?;
        check_range("dedup.fuzzy_bonus", self.dedup.fuzzy_bonus, 0.0, 1.0)?;
        check_range("dedup.fuzzy_similarity", self.dedup.fuzzy_similarity, 0.0, 1.0)?;
        check_positive("dedup.fuzzy_window_hours", self.dedup.fuzzy_window_hours)?;

        check_positive("scoring.decay_rate", self.scoring.decay_rate)?;
        check_range("scoring.indicator_boost", self.scoring.indicator_boost, 0.0, 100.0)?;
        check_range("scoring.keyword_boost", self.scoring.keyword_boost, 0.0, 100.0)?;

        let t = self.alert.thresholds;
        if !(t[0] < t[1] && t[1] < t[2] && t[2] < t[3]) {
            return Err(ConfigError::NonMonotonicThresholds(t));
        }
        for (i, &v) in t.iter().enumerate() {
            if !(0.0..=100.0).contains(&v) {
                return Err(ConfigError::OutOfRange {
                    field: match i {
                        0 => "alert.thresholds[0]",
                        1 => "alert.thresholds[1]",
                        2 => "alert.thresholds[2]",
                        _ => "alert.thresholds[3]",
                    },
                    min: 0.0,
                    max: 100.0,
                    value: v,
                });
            }
        }
        check_positive("alert.dwell_hours", self.alert.dwell_hours)?;

        if self.synthesis.max_records_per_section == 0 {
            return Err(ConfigError::NotPositive {
                field: "synthesis.max_records_per_section",
                value: 0.0,
            });
        }
        if self.synthesis.stage_timeout_secs == 0 {
            return Err(ConfigError::NotPositive {
                field: "synthesis.stage_timeout_secs",
                value: 0.0,
            });
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange { field, min, max, value });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}
