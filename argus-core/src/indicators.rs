//! Indicator extraction from record text
//!
//! Pulls technical indicators (IOCs) and MITRE ATT&CK technique ids out of
//! summaries so the scorer can weight records carrying hard indicators and
//! the SITREP can list them without trusting the language model to do so.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Kinds of technical indicators the engine recognizes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// CVE identifier
    Cve,
    /// MITRE ATT&CK technique (T1234 / T1234.001)
    MitreAttack,
    /// IPv4 address
    Ipv4,
    /// Domain name
    Domain,
    /// Email address
    Email,
    /// MD5 hash
    Md5,
    /// SHA1 hash
    Sha1,
    /// SHA256 hash
    Sha256,
    /// URL
    Url,
}

/// An extracted indicator with the id of the record it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: IndicatorKind,
    pub value: String,
    /// Record id this indicator was extracted from
    pub record_id: String,
}

static CVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bCVE-\d{4}-\d{4,}\b").unwrap());

static MITRE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bT\d{4}(?:\.\d{3})?\b").unwrap());

static IPV4_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b").unwrap()
});

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}\b").unwrap()
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").unwrap()
});

static MD5_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-fA-F0-9]{32}\b").unwrap());

static SHA1_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-fA-F0-9]{40}\b").unwrap());

static SHA256_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-fA-F0-9]{64}\b").unwrap());

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).unwrap());

fn try_add(
    indicators: &mut Vec<Indicator>,
    seen: &mut HashSet<String>,
    kind: IndicatorKind,
    value: &str,
    record_id: &str,
) {
    let key = format!("{:?}:{}", kind, value.to_lowercase());
    if seen.insert(key) {
        indicators.push(Indicator {
            kind,
            value: value.to_string(),
            record_id: record_id.to_string(),
        });
    }
}

/// Extract all recognized indicators from text, deduplicated per call
pub fn extract_indicators(text: &str, record_id: &str) -> Vec<Indicator> {
    let mut indicators = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for cap in CVE_REGEX.find_iter(text) {
        try_add(&mut indicators, &mut seen, IndicatorKind::Cve, cap.as_str(), record_id);
    }
    for cap in MITRE_REGEX.find_iter(text) {
        try_add(&mut indicators, &mut seen, IndicatorKind::MitreAttack, cap.as_str(), record_id);
    }
    for cap in URL_REGEX.find_iter(text) {
        try_add(&mut indicators, &mut seen, IndicatorKind::Url, cap.as_str(), record_id);
    }

    // Hash order matters: SHA256 supersedes SHA1 supersedes MD5
    for cap in SHA256_REGEX.find_iter(text) {
        try_add(&mut indicators, &mut seen, IndicatorKind::Sha256, cap.as_str(), record_id);
    }
    for cap in SHA1_REGEX.find_iter(text) {
        let sha256_key = format!("{:?}:{}", IndicatorKind::Sha256, cap.as_str().to_lowercase());
        if !seen.contains(&sha256_key) {
            try_add(&mut indicators, &mut seen, IndicatorKind::Sha1, cap.as_str(), record_id);
        }
    }
    for cap in MD5_REGEX.find_iter(text) {
        try_add(&mut indicators, &mut seen, IndicatorKind::Md5, cap.as_str(), record_id);
    }

    for cap in EMAIL_REGEX.find_iter(text) {
        try_add(&mut indicators, &mut seen, IndicatorKind::Email, cap.as_str(), record_id);
    }
    for cap in IPV4_REGEX.find_iter(text) {
        let ip = cap.as_str();
        if !ip.starts_with("0.") && ip != "127.0.0.1" {
            try_add(&mut indicators, &mut seen, IndicatorKind::Ipv4, ip, record_id);
        }
    }
    for cap in DOMAIN_REGEX.find_iter(text) {
        let domain = cap.as_str().to_lowercase();
        if !is_common_domain(&domain) {
            try_add(&mut indicators, &mut seen, IndicatorKind::Domain, cap.as_str(), record_id);
        }
    }

    indicators
}

/// Count of hard indicators in text; feeds the scorer's signal strength
pub fn indicator_signal(text: &str) -> usize {
    extract_indicators(text, "").len()
}

fn is_common_domain(domain: &str) -> bool {
    const COMMON: &[&str] = &[
        "google.com", "facebook.com", "twitter.com", "x.com", "github.com",
        "microsoft.com", "apple.com", "amazon.com", "youtube.com",
        "linkedin.com", "instagram.com", "wikipedia.org", "reddit.com",
        "t.me", "cisa.gov",
    ];
    COMMON.iter().any(|&c| domain.ends_with(c))
}
