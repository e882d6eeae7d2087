//! Scored associations between standards and evidence

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Which scoring path produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Cosine similarity over embeddings
    Embedding,
    /// Jaccard overlap over keyword sets (embedding backend unavailable)
    KeywordOverlap,
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScorerKind::Embedding => f.write_str("embedding"),
            ScorerKind::KeywordOverlap => f.write_str("keyword_overlap"),
        }
    }
}

/// A scored, ranked association between one standard and one evidence
/// document.
///
/// # Invariants
///
/// - `similarity_score` and `confidence` are within [0, 1]
/// - `confidence <= similarity_score`
/// - `page_numbers` is sorted ascending without duplicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardMatch {
    pub standard_id: String,
    pub evidence_id: String,
    pub similarity_score: f64,
    pub confidence: f64,
    pub page_numbers: Vec<u32>,
    pub matched_keywords: BTreeSet<String>,
}

impl StandardMatch {
    /// Create a match, normalizing scores and pages to uphold the invariants
    pub fn new(
        standard_id: impl Into<String>,
        evidence_id: impl Into<String>,
        similarity_score: f64,
        confidence: f64,
        page_numbers: impl IntoIterator<Item = u32>,
        matched_keywords: BTreeSet<String>,
    ) -> Self {
        let similarity_score = clamp_unit(similarity_score);
        let confidence = clamp_unit(confidence).min(similarity_score);
        let page_numbers: BTreeSet<u32> = page_numbers.into_iter().collect();

        Self {
            standard_id: standard_id.into(),
            evidence_id: evidence_id.into(),
            similarity_score,
            confidence,
            page_numbers: page_numbers.into_iter().collect(),
            matched_keywords,
        }
    }

    /// Stable reference used in audit records
    pub fn reference(&self) -> String {
        format!("{}::{}", self.standard_id, self.evidence_id)
    }

    /// Rank order: descending confidence, then descending similarity, then
    /// ascending evidence id.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .confidence
            .total_cmp(&self.confidence)
            .then_with(|| other.similarity_score.total_cmp(&self.similarity_score))
            .then_with(|| self.evidence_id.cmp(&other.evidence_id))
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Sort matches into rank order in place
pub fn rank_matches(matches: &mut [StandardMatch]) {
    matches.sort_by(StandardMatch::rank_cmp);
}
