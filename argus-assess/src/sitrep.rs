//! SITREP document model
//!
//! Ordered sections, each carrying its text, the record ids it cites, and
//! its drafting status. The Threat Matrix is computed deterministically
//! from the record set - the language model never touches it - so a report
//! produced with the backend down still carries the quantitative picture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use argus_core::{extract_indicators, Indicator, IntelCategory, IntelRecord, ThreatLevel};

use crate::AlertState;

/// Fixed section order of every SITREP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ExecutiveSummary,
    ThreatMatrix,
    KeyIntelligence,
    IocsTtps,
    ConfidenceAssessment,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::ExecutiveSummary,
        SectionKind::ThreatMatrix,
        SectionKind::KeyIntelligence,
        SectionKind::IocsTtps,
        SectionKind::ConfidenceAssessment,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::ExecutiveSummary => "EXECUTIVE SUMMARY",
            SectionKind::ThreatMatrix => "THREAT MATRIX",
            SectionKind::KeyIntelligence => "KEY INTELLIGENCE",
            SectionKind::IocsTtps => "IOCs & TTPs",
            SectionKind::ConfidenceAssessment => "CONFIDENCE ASSESSMENT",
        }
    }

    /// Sections drafted through the inference backend
    pub fn narrative(&self) -> bool {
        !matches!(self, SectionKind::ThreatMatrix)
    }
}

/// How a section ended up in the assembled report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Drafted by the backend and citation-verified
    Drafted,
    /// Present but flagged (dropped citations, partial failure)
    Degraded(String),
    /// Backend unreachable or stage failed; placeholder body
    Unavailable(String),
}

/// One section of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitrepSection {
    pub kind: SectionKind,
    pub body: String,
    /// Ids of records this section verifiably cites
    pub citations: Vec<String>,
    pub status: SectionStatus,
}

impl SitrepSection {
    pub fn unavailable(kind: SectionKind, reason: &str) -> Self {
        Self {
            kind,
            body: format!("[NARRATIVE UNAVAILABLE: {reason}]"),
            citations: Vec::new(),
            status: SectionStatus::Unavailable(reason.to_string()),
        }
    }
}

/// One row of the deterministic threat matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatMatrixRow {
    pub domain: IntelCategory,
    pub records: usize,
    pub mean_score: f64,
    pub activity: String,
    pub mean_confidence: f64,
}

/// Per-domain posture from the record set; no LLM involved
pub fn build_threat_matrix(records: &[IntelRecord]) -> Vec<ThreatMatrixRow> {
    let mut by_domain: BTreeMap<&'static str, (IntelCategory, Vec<&IntelRecord>)> = BTreeMap::new();
    for category in IntelCategory::ALL {
        by_domain.insert(category.label(), (category, Vec::new()));
    }
    for record in records {
        if let Some((_, bucket)) = by_domain.get_mut(record.category.label()) {
            bucket.push(record);
        }
    }

    IntelCategory::ALL
        .iter()
        .map(|&category| {
            let bucket = &by_domain[category.label()].1;
            if bucket.is_empty() {
                return ThreatMatrixRow {
                    domain: category,
                    records: 0,
                    mean_score: 0.0,
                    activity: "NO COLLECTION".to_string(),
                    mean_confidence: 0.0,
                };
            }
            let mean_score =
                bucket.iter().map(|r| r.threat_score).sum::<f64>() / bucket.len() as f64;
            let mean_confidence =
                bucket.iter().map(|r| r.confidence).sum::<f64>() / bucket.len() as f64;
            ThreatMatrixRow {
                domain: category,
                records: bucket.len(),
                mean_score,
                activity: ThreatLevel::from_score(mean_score).label().to_string(),
                mean_confidence,
            }
        })
        .collect()
}

/// Collect indicators across a record set, deduplicated by kind + value
pub fn collect_indicators(records: &[IntelRecord]) -> Vec<Indicator> {
    let mut seen = std::collections::HashSet::new();
    let mut all = Vec::new();
    for record in records {
        for indicator in extract_indicators(&record.summary, &record.id) {
            let key = (indicator.kind.clone(), indicator.value.to_lowercase());
            if seen.insert(key) {
                all.push(indicator);
            }
        }
    }
    all
}

/// The assembled situation report; immutable once rendered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sitrep {
    pub scope: String,
    pub window_hours: i64,
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub aggregate_score: f64,
    pub alert: AlertState,
    pub matrix: Vec<ThreatMatrixRow>,
    pub indicators: Vec<Indicator>,
    pub sections: Vec<SitrepSection>,
}

impl Sitrep {
    /// Render the full report as markdown
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "# INTELLIGENCE ASSESSMENT: {}\n\n", self.scope.to_uppercase()
        ));
        out.push_str(&format!(
            "Generated {} UTC | window {}h | {} records | aggregate {:.1}/100 | alert {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M"),
            self.window_hours,
            self.record_count,
            self.aggregate_score,
            self.alert.level,
        ));

        for section in &self.sections {
            out.push_str(&format!("## {}\n\n", section.kind.title()));

            if section.kind == SectionKind::ThreatMatrix {
                out.push_str("| Domain | Records | Activity | Mean Score | Confidence |\n");
                out.push_str("|--------|---------|----------|------------|------------|\n");
                for row in &self.matrix {
                    out.push_str(&format!(
                        "| {} | {} | {} | {:.1} | {:.2} |\n",
                        row.domain, row.records, row.activity, row.mean_score, row.mean_confidence,
                    ));
                }
                out.push('\n');
                continue;
            }

            out.push_str(section.body.trim());
            out.push_str("\n\n");

            if section.kind == SectionKind::IocsTtps && !self.indicators.is_empty() {
                out.push_str("Extracted indicators:\n");
                for indicator in &self.indicators {
                    out.push_str(&format!(
                        "- {:?}: {} (from {})\n",
                        indicator.kind, indicator.value, indicator.record_id
                    ));
                }
                out.push('\n');
            }

            if !section.citations.is_empty() {
                out.push_str(&format!("Sources: {}\n\n", section.citations.join(", ")));
            }
            if let SectionStatus::Degraded(reason) = &section.status {
                out.push_str(&format!("_[SECTION DEGRADED: {reason}]_\n\n"));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(category: IntelCategory, key: &str, score: f64, confidence: f64) -> IntelRecord {
        let mut record = IntelRecord::new(category, key, format!("record {key}"), confidence);
        record.threat_score = score;
        record.threat_level = ThreatLevel::from_score(score);
        record
    }

    #[test]
    fn test_matrix_has_all_domains() {
        let records = vec![
            scored(IntelCategory::Cyber, "CVE-2024-0001", 95.0, 0.9),
            scored(IntelCategory::Cyber, "CVE-2024-0002", 85.0, 1.0),
            scored(IntelCategory::News, "https://example.com/a", 40.0, 0.6),
        ];
        let matrix = build_threat_matrix(&records);
        assert_eq!(matrix.len(), IntelCategory::ALL.len());

        let cyber = matrix.iter().find(|r| r.domain == IntelCategory::Cyber).unwrap();
        assert_eq!(cyber.records, 2);
        assert_eq!(cyber.mean_score, 90.0);
        assert_eq!(cyber.activity, "CRITICAL");

        let social = matrix.iter().find(|r| r.domain == IntelCategory::Social).unwrap();
        assert_eq!(social.activity, "NO COLLECTION");
    }

    #[test]
    fn test_indicator_collection_dedups_across_records() {
        let mut a = scored(IntelCategory::Cyber, "k1", 80.0, 0.9);
        a.summary = "exploitation of CVE-2024-3400 observed".into();
        let mut b = scored(IntelCategory::News, "k2", 40.0, 0.6);
        b.summary = "vendor confirms CVE-2024-3400 patched".into();

        let indicators = collect_indicators(&[a, b]);
        let cves: Vec<_> = indicators
            .iter()
            .filter(|i| i.value == "CVE-2024-3400")
            .collect();
        assert_eq!(cves.len(), 1);
    }

    #[test]
    fn test_render_contains_all_sections() {
        let sitrep = Sitrep {
            scope: "ukraine".into(),
            window_hours: 24,
            generated_at: Utc::now(),
            record_count: 0,
            aggregate_score: 12.0,
            alert: AlertState::default(),
            matrix: build_threat_matrix(&[]),
            indicators: vec![],
            sections: SectionKind::ALL
                .iter()
                .map(|&kind| SitrepSection::unavailable(kind, "inference backend unreachable"))
                .collect(),
        };
        let rendered = sitrep.render();
        for kind in SectionKind::ALL {
            assert!(rendered.contains(kind.title()));
        }
        assert!(rendered.contains("NARRATIVE UNAVAILABLE"));
        assert!(rendered.contains("| Domain |"));
    }
}
