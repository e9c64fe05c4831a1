//! Caller-facing output: the answer followed by a fenced JSON evidence block.
//!
//! Metadata differs between storage backends, so every field falls back to a
//! placeholder instead of failing.

use serde::{Deserialize, Serialize};

use rag_core::types::{EvidenceEntry, RankedItem};

pub const NO_SCORE: &str = "N/A";
pub const UNKNOWN_SOURCE: &str = "Unknown";
pub const NO_HEADER: &str = "No header";
pub const NO_CONTENT: &str = "No content";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub evidence: Vec<EvidenceEntry>,
}

impl RagResponse {
    pub fn new(answer: String, ranked: &[RankedItem], summary_chunks: usize) -> Self {
        Self { answer, evidence: evidence(ranked, summary_chunks) }
    }

    pub fn render(&self) -> String {
        render(&self.answer, &self.evidence)
    }
}

/// At most `summary_chunks` entries, never padded.
pub fn evidence(ranked: &[RankedItem], summary_chunks: usize) -> Vec<EvidenceEntry> {
    ranked.iter().take(summary_chunks).map(evidence_entry).collect()
}

pub fn evidence_entry(item: &RankedItem) -> EvidenceEntry {
    let chunk = &item.result.chunk;
    let text = chunk.text.trim();
    EvidenceEntry {
        score: format_score(item.score),
        source: chunk.source().unwrap_or(UNKNOWN_SOURCE).to_string(),
        header: chunk.header().unwrap_or(NO_HEADER).to_string(),
        chunk: if text.is_empty() { NO_CONTENT.to_string() } else { chunk.text.clone() },
    }
}

pub fn format_score(score: Option<f32>) -> String {
    match score {
        Some(s) if s.is_finite() => format!("{:.2}", s),
        _ => NO_SCORE.to_string(),
    }
}

pub fn render(answer: &str, evidence: &[EvidenceEntry]) -> String {
    let json = serde_json::to_string_pretty(evidence).unwrap_or_else(|_| "[]".to_string());
    format!("{}\n\n```json\n{}\n```", answer, json)
}

/// Evidence entries from a rendered response, if the block is present and valid.
pub fn parse_evidence(rendered: &str) -> Option<Vec<EvidenceEntry>> {
    let start = rendered.rfind("```json\n")? + "```json\n".len();
    let end = start + rendered[start..].rfind("\n```")?;
    serde_json::from_str(&rendered[start..end]).ok()
}
