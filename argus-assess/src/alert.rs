//! Alert-level resolver
//!
//! Five ordered readiness levels, DEFCON-style descending severity
//! numbering (5 = routine, 1 = maximum alert). Severity raises immediately
//! when the aggregate crosses a threshold upward; it lowers only after the
//! aggregate has stayed below the lower threshold for the configured dwell
//! period, so a single noisy spike cannot oscillate the posture.
//!
//! State is scope-keyed and explicit - no process-wide singleton - so one
//! scope's posture never bleeds into another's.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use argus_core::AlertConfig;

/// Readiness levels, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Level 1 - maximum alert
    CockedPistol,
    /// Level 2
    FastPace,
    /// Level 3
    RoundHouse,
    /// Level 4
    DoubleTake,
    /// Level 5 - routine readiness
    FadeOut,
}

impl AlertLevel {
    /// DEFCON-style numeric level (1 = most severe)
    pub fn number(&self) -> u8 {
        match self {
            AlertLevel::CockedPistol => 1,
            AlertLevel::FastPace => 2,
            AlertLevel::RoundHouse => 3,
            AlertLevel::DoubleTake => 4,
            AlertLevel::FadeOut => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlertLevel::CockedPistol => "COCKED PISTOL",
            AlertLevel::FastPace => "FAST PACE",
            AlertLevel::RoundHouse => "ROUND HOUSE",
            AlertLevel::DoubleTake => "DOUBLE TAKE",
            AlertLevel::FadeOut => "FADE OUT",
        }
    }

    /// True when `self` is a more severe posture than `other`
    pub fn more_severe_than(&self, other: AlertLevel) -> bool {
        self.number() < other.number()
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LEVEL {} ({})", self.number(), self.name())
    }
}

/// Alert state for one scope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub level: AlertLevel,
    /// When the aggregate first dropped below the current level's band;
    /// cleared whenever it climbs back
    pub below_since: Option<DateTime<Utc>>,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            level: AlertLevel::FadeOut,
            below_since: None,
        }
    }
}

/// The level an aggregate score maps to, ignoring hysteresis
fn target_level(score: f64, thresholds: &[f64; 4]) -> AlertLevel {
    if score >= thresholds[3] {
        AlertLevel::CockedPistol
    } else if score >= thresholds[2] {
        AlertLevel::FastPace
    } else if score >= thresholds[1] {
        AlertLevel::RoundHouse
    } else if score >= thresholds[0] {
        AlertLevel::DoubleTake
    } else {
        AlertLevel::FadeOut
    }
}

/// Pure hysteresis step: raise immediately, lower only after dwell
pub fn step(state: AlertState, score: f64, now: DateTime<Utc>, config: &AlertConfig) -> AlertState {
    let target = target_level(score, &config.thresholds);

    if target.more_severe_than(state.level) {
        return AlertState {
            level: target,
            below_since: None,
        };
    }

    if target == state.level {
        return AlertState {
            level: state.level,
            below_since: None,
        };
    }

    // Score sits below the current band: start or continue the dwell clock
    let dwell = Duration::seconds((config.dwell_hours * 3600.0) as i64);
    match state.below_since {
        Some(since) if now - since >= dwell => AlertState {
            level: target,
            below_since: None,
        },
        Some(since) => AlertState {
            level: state.level,
            below_since: Some(since),
        },
        None => AlertState {
            level: state.level,
            below_since: Some(now),
        },
    }
}

/// Scope-keyed resolver; each scope starts at the least severe level
pub struct AlertResolver {
    config: AlertConfig,
    scopes: DashMap<String, AlertState>,
}

impl AlertResolver {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            scopes: DashMap::new(),
        }
    }

    /// Feed one aggregate observation for a scope, returning the new state
    pub fn observe(&self, scope: &str, score: f64, now: DateTime<Utc>) -> AlertState {
        let mut entry = self.scopes.entry(scope.to_string()).or_default();
        let next = step(*entry, score, now, &self.config);
        if next.level != entry.level {
            info!(scope, from = %entry.level, to = %next.level, score, "alert level changed");
        }
        *entry = next;
        next
    }

    /// Current state without observing (FADE OUT for unseen scopes)
    pub fn current(&self, scope: &str) -> AlertState {
        self.scopes
            .get(scope)
            .map(|e| *e.value())
            .unwrap_or_default()
    }
}

impl Default for AlertResolver {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlertConfig {
        AlertConfig::default() // thresholds 30/50/70/85, dwell 2h
    }

    #[test]
    fn test_initial_state_least_severe() {
        let resolver = AlertResolver::new(config());
        assert_eq!(resolver.current("ukraine").level, AlertLevel::FadeOut);
    }

    #[test]
    fn test_raise_is_immediate() {
        let resolver = AlertResolver::new(config());
        let now = Utc::now();
        let state = resolver.observe("ukraine", 72.0, now);
        assert_eq!(state.level, AlertLevel::FastPace);
    }

    #[test]
    fn test_no_downgrade_before_dwell() {
        let resolver = AlertResolver::new(config());
        let now = Utc::now();
        resolver.observe("ukraine", 72.0, now);

        // A momentary dip does not lower the posture
        let state = resolver.observe("ukraine", 20.0, now + Duration::minutes(10));
        assert_eq!(state.level, AlertLevel::FastPace);
        assert!(state.below_since.is_some());
    }

    #[test]
    fn test_downgrade_after_dwell() {
        let resolver = AlertResolver::new(config());
        let now = Utc::now();
        resolver.observe("ukraine", 72.0, now);
        resolver.observe("ukraine", 20.0, now + Duration::minutes(10));
        let state = resolver.observe("ukraine", 20.0, now + Duration::hours(3));
        assert_eq!(state.level, AlertLevel::FadeOut);
        assert!(state.below_since.is_none());
    }

    #[test]
    fn test_spike_resets_dwell_clock() {
        let resolver = AlertResolver::new(config());
        let now = Utc::now();
        resolver.observe("ukraine", 72.0, now);
        resolver.observe("ukraine", 20.0, now + Duration::minutes(30));
        // Score climbs back into band: dwell clock clears
        resolver.observe("ukraine", 75.0, now + Duration::hours(1));
        // Dips again; only 30 minutes below, no downgrade
        let state = resolver.observe("ukraine", 20.0, now + Duration::hours(1) + Duration::minutes(30));
        assert_eq!(state.level, AlertLevel::FastPace);
    }

    #[test]
    fn test_scopes_isolated() {
        let resolver = AlertResolver::new(config());
        let now = Utc::now();
        resolver.observe("ukraine", 90.0, now);
        assert_eq!(resolver.current("ukraine").level, AlertLevel::CockedPistol);
        assert_eq!(resolver.current("taiwan").level, AlertLevel::FadeOut);
    }
}
