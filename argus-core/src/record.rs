//! The canonical Intel Record - the unit every source normalizes into
//!
//! Records are keyed by a deterministic hash of (category, natural key) so
//! re-ingesting the same article, vessel position, or CVE is idempotent.
//! Threat fields are always derived by the scorer, never adapter-supplied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Intelligence domains a record can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntelCategory {
    /// Press and news-wire reporting
    News,
    /// Social media chatter
    Social,
    /// Satellite imagery catalog metadata
    Imagery,
    /// Aircraft tracking (ADS-B)
    AirTrack,
    /// Vessel tracking (AIS)
    MaritimeTrack,
    /// Cyber threat feeds (CVEs, malware reporting)
    Cyber,
}

impl IntelCategory {
    /// All categories in fixed report order
    pub const ALL: [IntelCategory; 6] = [
        IntelCategory::News,
        IntelCategory::Social,
        IntelCategory::Imagery,
        IntelCategory::AirTrack,
        IntelCategory::MaritimeTrack,
        IntelCategory::Cyber,
    ];

    /// Report heading for this domain
    pub fn label(&self) -> &'static str {
        match self {
            IntelCategory::News => "OSINT",
            IntelCategory::Social => "SOCMINT",
            IntelCategory::Imagery => "GEOINT",
            IntelCategory::AirTrack => "ADSINT",
            IntelCategory::MaritimeTrack => "MARITINT",
            IntelCategory::Cyber => "CYBINT",
        }
    }
}

impl std::fmt::Display for IntelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Discrete threat banding of a continuous score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    #[default]
    Info,
    Low,
    Moderate,
    High,
    Critical,
}

impl ThreatLevel {
    /// Fixed monotonic banding: [0,20) info, [20,40) low, [40,60) moderate,
    /// [60,80) high, [80,100] critical.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ThreatLevel::Critical
        } else if score >= 60.0 {
            ThreatLevel::High
        } else if score >= 40.0 {
            ThreatLevel::Moderate
        } else if score >= 20.0 {
            ThreatLevel::Low
        } else {
            ThreatLevel::Info
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThreatLevel::Info => "INFO",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Moderate => "MODERATE",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Latitude/longitude pair, present only when resolvable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Valid WGS84 ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Stable record id from (category, natural key)
///
/// The natural key is whatever uniquely identifies the item at its source:
/// article URL, ICAO hex, MMSI, CVE id, scene id. Hashing keeps ids opaque
/// and fixed-width while staying fully deterministic.
pub fn record_id(category: IntelCategory, natural_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.label().as_bytes());
    hasher.update(b":");
    hasher.update(natural_key.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// The canonical unit of intelligence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelRecord {
    /// Deterministic id - see [`record_id`]
    pub id: String,

    /// Ingestion time (not the underlying event time); immutable once written
    pub collected_at: DateTime<Utc>,

    /// Intelligence domain
    pub category: IntelCategory,

    /// Short human-readable summary
    pub summary: String,

    /// Best-effort geopolitical attribution
    pub country: Option<String>,
    pub region: Option<String>,

    /// Position, when resolvable
    pub coordinates: Option<GeoPoint>,

    /// Collection keyword/tasking that produced this record
    pub keyword: Option<String>,

    /// Human-readable feed or platform name
    pub source_name: Option<String>,

    /// Derived by the scorer; banding of `threat_score`
    pub threat_level: ThreatLevel,

    /// Derived by the scorer; continuous in [0, 100]
    pub threat_score: f64,

    /// Source reliability plus corroboration, in [0, 1]
    pub confidence: f64,

    /// Opaque pointer back to the source payload; never interpreted
    pub raw_ref: String,
}

impl IntelRecord {
    /// New record with unscored threat fields; the scorer fills them in.
    pub fn new(
        category: IntelCategory,
        natural_key: &str,
        summary: String,
        confidence: f64,
    ) -> Self {
        Self {
            id: record_id(category, natural_key),
            collected_at: Utc::now(),
            category,
            summary,
            country: None,
            region: None,
            coordinates: None,
            keyword: None,
            source_name: None,
            threat_level: ThreatLevel::Info,
            threat_score: 0.0,
            confidence: confidence.clamp(crate::MIN_CONFIDENCE, crate::MAX_CONFIDENCE),
            raw_ref: String::new(),
        }
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_coordinates(mut self, point: GeoPoint) -> Self {
        self.coordinates = Some(point);
        self
    }

    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keyword = Some(keyword.to_string());
        self
    }

    pub fn with_source_name(mut self, name: &str) -> Self {
        self.source_name = Some(name.to_string());
        self
    }

    pub fn with_raw_ref(mut self, raw_ref: &str) -> Self {
        self.raw_ref = raw_ref.to_string();
        self
    }

    /// Score weighted by how much we trust it
    pub fn effective_score(&self) -> f64 {
        self.threat_score * self.confidence
    }

    /// Invariant: the stored level must equal the banding of the stored score
    pub fn banding_consistent(&self) -> bool {
        self.threat_level == ThreatLevel::from_score(self.threat_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_deterministic() {
        let a = record_id(IntelCategory::Cyber, "CVE-2024-12345");
        let b = record_id(IntelCategory::Cyber, "cve-2024-12345");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_record_id_category_scoped() {
        let news = record_id(IntelCategory::News, "https://example.com/a");
        let social = record_id(IntelCategory::Social, "https://example.com/a");
        assert_ne!(news, social);
    }

    #[test]
    fn test_banding_boundaries() {
        assert_eq!(ThreatLevel::from_score(0.0), ThreatLevel::Info);
        assert_eq!(ThreatLevel::from_score(19.99), ThreatLevel::Info);
        assert_eq!(ThreatLevel::from_score(20.0), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(40.0), ThreatLevel::Moderate);
        assert_eq!(ThreatLevel::from_score(60.0), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_score(80.0), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(100.0), ThreatLevel::Critical);
    }

    #[test]
    fn test_banding_monotonic() {
        let mut prev = ThreatLevel::Info;
        for i in 0..=100 {
            let level = ThreatLevel::from_score(i as f64);
            assert!(level >= prev, "banding regressed at score {}", i);
            prev = level;
        }
    }

    #[test]
    fn test_confidence_clamped() {
        let record = IntelRecord::new(IntelCategory::Social, "post-1", "chatter".into(), 1.7);
        assert_eq!(record.confidence, 1.0);
    }
}
