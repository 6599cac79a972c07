//! Assessment synthesizer
//!
//! Drives the inference backend through a deterministic multi-stage
//! pipeline: optional topic framing, per-section drafting over a bounded
//! slice of the record set, citation binding against record content, and
//! fixed-order assembly. The backend is an untrusted text oracle - every
//! citation it claims is verified against the records, and any stage
//! failure degrades only its own section. With no backend at all the
//! report still carries the full quantitative picture.

use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use argus_core::{IntelRecord, SynthesisConfig};

use crate::{
    build_threat_matrix, collect_indicators, AlertResolver, InferenceError, SectionKind,
    SectionStatus, SharedBackend, Sitrep, SitrepSection, ThreatScorer,
};

const SYSTEM_PROMPT: &str = "\
You are an automated multi-INT fusion analysis engine drafting one section \
of an intelligence assessment. Rules: be factual and cite only the provided \
records; reference a record by writing its marker, e.g. [REC:abc123], inline \
where you use it; do not fabricate indicators or events; no recommendations, \
no action items, no signatures, no conversational filler. Tone is cold, \
objective, analytical. Distinguish the SOURCE of intel from its SUBJECT.";

const FRAMING_PROMPT: &str = "\
You are planning an intelligence collection sweep. Given the target below, \
return ONLY a JSON object of the form {\"keywords\": [\"...\"]} with 3-5 \
short search keywords. No markdown, no explanation.";

#[derive(Deserialize, Default)]
struct Framing {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Builds SITREPs from a filtered record set
pub struct Synthesizer {
    backend: Option<SharedBackend>,
    scorer: ThreatScorer,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(
        backend: Option<SharedBackend>,
        scorer: ThreatScorer,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            backend,
            scorer,
            config,
        }
    }

    /// Stage 1 (optional, pre-sweep): propose collection keywords for a
    /// free-text target. Purely advisory - any failure falls back to the
    /// target itself and never affects scoring.
    pub async fn frame_topic(&self, topic: &str) -> Vec<String> {
        let fallback = vec![topic.to_string()];
        let Some(backend) = &self.backend else {
            return fallback;
        };

        let user = format!("TARGET: {topic}");
        let reply = match self.bounded(backend.generate(FRAMING_PROMPT, &user)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "topic framing failed, using raw target");
                return fallback;
            }
        };

        match parse_framing(&reply) {
            Some(framing) if !framing.keywords.is_empty() => framing.keywords,
            _ => {
                warn!("topic framing returned no usable keywords");
                fallback
            }
        }
    }

    /// Build the full SITREP for a scope over a record set.
    ///
    /// Never fails: backend trouble degrades individual sections, and a
    /// missing backend yields a deterministic report with narrative
    /// sections explicitly marked unavailable.
    pub async fn synthesize(
        &self,
        scope: &str,
        window_hours: i64,
        records: &[IntelRecord],
        resolver: &AlertResolver,
    ) -> Sitrep {
        let now = Utc::now();
        let aggregate_score = self.scorer.aggregate(records, now);
        let alert = resolver.observe(scope, aggregate_score, now);
        let matrix = build_threat_matrix(records);
        let indicators = collect_indicators(records);
        let ranked = self.rank(records);

        let mut sections = Vec::with_capacity(SectionKind::ALL.len());
        for kind in SectionKind::ALL {
            if !kind.narrative() {
                sections.push(SitrepSection {
                    kind,
                    body: "Quantitative posture by domain, derived directly from the record set."
                        .to_string(),
                    citations: Vec::new(),
                    status: SectionStatus::Drafted,
                });
                continue;
            }
            sections.push(self.draft_section(kind, scope, &ranked, records).await);
        }

        Sitrep {
            scope: scope.to_string(),
            window_hours,
            generated_at: now,
            record_count: records.len(),
            aggregate_score,
            alert,
            matrix,
            indicators,
            sections,
        }
    }

    /// Stage 2 + 3 for one section: draft, then bind citations
    async fn draft_section(
        &self,
        kind: SectionKind,
        scope: &str,
        ranked: &[&IntelRecord],
        all_records: &[IntelRecord],
    ) -> SitrepSection {
        let Some(backend) = &self.backend else {
            return SitrepSection::unavailable(kind, "no inference backend configured");
        };

        let user = self.section_prompt(kind, scope, ranked);
        let draft = match self.bounded(backend.generate(SYSTEM_PROMPT, &user)).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(section = kind.title(), error = %e, "section drafting failed");
                return SitrepSection::unavailable(kind, &e.to_string());
            }
        };

        bind_citations(kind, &draft, all_records)
    }

    fn section_prompt(&self, kind: SectionKind, scope: &str, ranked: &[&IntelRecord]) -> String {
        let instruction = match kind {
            SectionKind::ExecutiveSummary => {
                "Write a 2-3 sentence executive summary of the current threat landscape \
                 and the key takeaway for decision makers."
            }
            SectionKind::KeyIntelligence => {
                "Summarize the key findings grouped by intelligence domain. One short \
                 bullet per finding. State NO COLLECTION for domains without records."
            }
            SectionKind::IocsTtps => {
                "List observed indicators of compromise and tactics, techniques and \
                 procedures evidenced by the records. Do not list social media accounts \
                 or news outlets as threat actors."
            }
            SectionKind::ConfidenceAssessment => {
                "Assess the overall confidence of this picture: source reliability, \
                 corroboration, and the main intelligence gaps."
            }
            SectionKind::ThreatMatrix => unreachable!("matrix is deterministic"),
        };

        let mut prompt = format!("TARGET: {scope}\nSECTION: {}\n{instruction}\n\nRECORDS:\n", kind.title());
        for record in ranked {
            let summary = truncate(&record.summary, self.config.summary_truncate);
            prompt.push_str(&format!(
                "[REC:{}] ({}/{} score {:.0} conf {:.2}) {}\n",
                record.id,
                record.category,
                record.threat_level,
                record.threat_score,
                record.confidence,
                summary,
            ));
        }
        prompt
    }

    /// Most relevant records first, capped to respect backend context limits
    fn rank<'a>(&self, records: &'a [IntelRecord]) -> Vec<&'a IntelRecord> {
        let mut ranked: Vec<&IntelRecord> = records.iter().collect();
        ranked.sort_by(|a, b| {
            b.effective_score()
                .partial_cmp(&a.effective_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(self.config.max_records_per_section);
        ranked
    }

    /// Hard per-stage timeout on top of whatever the backend enforces
    async fn bounded<F>(&self, call: F) -> Result<String, InferenceError>
    where
        F: std::future::Future<Output = Result<String, InferenceError>>,
    {
        let limit = Duration::from_secs(self.config.stage_timeout_secs);
        timeout(limit, call)
            .await
            .map_err(|_| InferenceError::Timeout(limit))?
    }
}

/// Extract `[REC:<id>]` markers from a draft
fn cited_ids(draft: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = draft;
    while let Some(start) = rest.find("[REC:") {
        rest = &rest[start + 5..];
        if let Some(end) = rest.find(']') {
            let id = rest[..end].trim().to_string();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
            rest = &rest[end + 1..];
        } else {
            break;
        }
    }
    ids
}

/// A citation is verified when the cited record exists in the input set and
/// the draft actually traces to its content (shares a distinctive token
/// with the record summary).
fn citation_verified(draft: &str, record: &IntelRecord) -> bool {
    let body = draft.to_lowercase();
    record
        .summary
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 5)
        .any(|token| body.contains(token))
}

/// Stage 3: validate the backend's citations against the record set.
/// Unverifiable citations are dropped and the section flagged - the
/// backend's own claims are never trusted.
fn bind_citations(kind: SectionKind, draft: &str, records: &[IntelRecord]) -> SitrepSection {
    let mut citations = Vec::new();
    let mut dropped = 0;

    for id in cited_ids(draft) {
        match records.iter().find(|r| r.id == id) {
            Some(record) if citation_verified(draft, record) => citations.push(id),
            Some(_) => {
                debug!(section = kind.title(), id, "citation does not trace to record content");
                dropped += 1;
            }
            None => {
                debug!(section = kind.title(), id, "citation to unknown record");
                dropped += 1;
            }
        }
    }

    let status = if dropped > 0 {
        SectionStatus::Degraded(format!("{dropped} unverifiable citation(s) dropped"))
    } else {
        SectionStatus::Drafted
    };

    SitrepSection {
        kind,
        body: draft.trim().to_string(),
        citations,
        status,
    }
}

fn parse_framing(reply: &str) -> Option<Framing> {
    // Models wrap JSON in code fences despite instructions
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned).ok()
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertLevel, InferenceBackend};
    use argus_core::{EngineConfig, IntelCategory, ThreatLevel};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubBackend {
        reply: String,
    }

    #[async_trait]
    impl InferenceBackend for StubBackend {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String, InferenceError> {
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    struct DownBackend;

    #[async_trait]
    impl InferenceBackend for DownBackend {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String, InferenceError> {
            Err(InferenceError::Api("connection refused".into()))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    fn scored(key: &str, summary: &str, score: f64) -> IntelRecord {
        let mut record =
            IntelRecord::new(IntelCategory::Cyber, key, summary.to_string(), 0.9);
        record.threat_score = score;
        record.threat_level = ThreatLevel::from_score(score);
        record
    }

    fn synthesizer(backend: Option<SharedBackend>) -> Synthesizer {
        let config = EngineConfig::default();
        Synthesizer::new(backend, ThreatScorer::new(config.scoring), config.synthesis)
    }

    #[tokio::test]
    async fn test_unreachable_backend_yields_degraded_but_valid_report() {
        let synth = synthesizer(Some(Arc::new(DownBackend)));
        let resolver = AlertResolver::default();
        let records = vec![
            scored("CVE-2024-0001", "active exploitation of CVE-2024-0001 reported", 92.0),
            scored("CVE-2024-0002", "proof of concept exploit released", 65.0),
        ];

        let sitrep = synth.synthesize("global", 24, &records, &resolver).await;

        assert_eq!(sitrep.sections.len(), SectionKind::ALL.len());
        assert!(sitrep.aggregate_score > 0.0);
        assert!(sitrep
            .matrix
            .iter()
            .any(|row| row.domain == IntelCategory::Cyber && row.records == 2));
        let narrative_down = sitrep
            .sections
            .iter()
            .filter(|s| matches!(s.status, SectionStatus::Unavailable(_)))
            .count();
        assert_eq!(narrative_down, 4); // everything except the matrix
        assert!(sitrep.render().contains("NARRATIVE UNAVAILABLE"));
    }

    #[tokio::test]
    async fn test_no_backend_configured_still_reports() {
        let synth = synthesizer(None);
        let resolver = AlertResolver::default();
        let sitrep = synth.synthesize("global", 24, &[], &resolver).await;
        assert_eq!(sitrep.record_count, 0);
        assert_eq!(sitrep.aggregate_score, 0.0);
        assert_eq!(sitrep.alert.level, AlertLevel::FadeOut);
    }

    #[tokio::test]
    async fn test_invented_citation_rejected_and_flagged() {
        let records = vec![scored(
            "CVE-2024-0001",
            "active exploitation of CVE-2024-0001 against perimeter appliances",
            92.0,
        )];
        let real_id = records[0].id.clone();
        let reply = format!(
            "Exploitation of perimeter appliances continues [REC:{real_id}]. \
             A second wave is expected [REC:ffffffffffffffff]."
        );
        let synth = synthesizer(Some(Arc::new(StubBackend { reply })));
        let resolver = AlertResolver::default();

        let sitrep = synth.synthesize("global", 24, &records, &resolver).await;
        let exec = sitrep
            .sections
            .iter()
            .find(|s| s.kind == SectionKind::ExecutiveSummary)
            .unwrap();

        assert_eq!(exec.citations, vec![real_id]);
        assert!(matches!(exec.status, SectionStatus::Degraded(_)));
    }

    #[tokio::test]
    async fn test_citation_must_trace_to_record_content() {
        let records = vec![scored(
            "CVE-2024-0001",
            "active exploitation of CVE-2024-0001 against perimeter appliances",
            92.0,
        )];
        let real_id = records[0].id.clone();
        // Cites a real id but the text shares nothing with the record
        let reply = format!("Naval drills are under way [REC:{real_id}].");
        let section = bind_citations(SectionKind::ExecutiveSummary, &reply, &records);

        assert!(section.citations.is_empty());
        assert!(matches!(section.status, SectionStatus::Degraded(_)));
    }

    #[tokio::test]
    async fn test_framing_falls_back_on_malformed_json() {
        let synth = synthesizer(Some(Arc::new(StubBackend {
            reply: "sorry, here are some ideas: ukraine, drones".into(),
        })));
        assert_eq!(synth.frame_topic("ukraine").await, vec!["ukraine".to_string()]);
    }

    #[tokio::test]
    async fn test_framing_parses_fenced_json() {
        let synth = synthesizer(Some(Arc::new(StubBackend {
            reply: "```json\n{\"keywords\": [\"ukraine\", \"drone strikes\"]}\n```".into(),
        })));
        let keywords = synth.frame_topic("ukraine").await;
        assert_eq!(keywords, vec!["ukraine".to_string(), "drone strikes".to_string()]);
    }

    #[test]
    fn test_ranking_caps_and_orders_by_effective_score() {
        let config = EngineConfig::default();
        let mut synth_config = config.synthesis.clone();
        synth_config.max_records_per_section = 2;
        let synth = Synthesizer::new(None, ThreatScorer::new(config.scoring), synth_config);

        let mut low = scored("a", "low", 30.0);
        low.confidence = 0.9;
        let mut high = scored("b", "high", 90.0);
        high.confidence = 0.9;
        let mut mid = scored("c", "mid", 80.0);
        mid.confidence = 0.5; // effective 40.0, between high (81.0) and low (27.0)

        let records = vec![low.clone(), high.clone(), mid.clone()];
        let ranked = synth.rank(&records);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, high.id);
        assert_eq!(ranked[1].id, mid.id);
    }
}
