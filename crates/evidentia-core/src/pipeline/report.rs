//! Run report returned to callers

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::context::{EvidenceAssignment, Narrative, PipelineContext, VerificationResult};
use super::{PipelineStage, StandardStatus};
use crate::model::{ScorerKind, StandardMatch};
use crate::types::Blake3Hash;

/// Everything a run produced, keyed by standard id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    /// Terminal stage: `Done` or `Failed`
    pub stage: PipelineStage,
    pub standards_scope: Vec<String>,
    pub statuses: BTreeMap<String, StandardStatus>,
    /// Itemized reasons for `Failed` and `NotAttempted` standards
    pub reasons: BTreeMap<String, Vec<String>>,
    pub candidates: BTreeMap<String, Vec<StandardMatch>>,
    pub matches: BTreeMap<String, EvidenceAssignment>,
    pub narratives: BTreeMap<String, Narrative>,
    pub gaps: BTreeSet<String>,
    pub verification_results: BTreeMap<String, VerificationResult>,
    /// Id to pass to `get_audit_trail`
    pub audit_chain_id: String,
    /// Hash of the last audit record written by this run
    pub audit_head: Blake3Hash,
    pub scorer_used: ScorerKind,
    /// Corpus generation the run read from
    pub corpus_generation: u64,
    /// Set when the run was cancelled
    pub error: Option<String>,
}

/// Per-status totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub done: usize,
    pub gap: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

impl RunReport {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_context(
        run_id: String,
        stage: PipelineStage,
        context: PipelineContext,
        statuses: BTreeMap<String, StandardStatus>,
        reasons: BTreeMap<String, Vec<String>>,
        audit_head: Blake3Hash,
        scorer_used: ScorerKind,
        corpus_generation: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            audit_chain_id: run_id.clone(),
            run_id,
            stage,
            standards_scope: context.standards_scope,
            statuses,
            reasons,
            candidates: context.candidates,
            matches: context.matches,
            narratives: context.narratives,
            gaps: context.gaps,
            verification_results: context.verification_results,
            audit_head,
            scorer_used,
            corpus_generation,
            error,
        }
    }

    pub fn status(&self, standard_id: &str) -> Option<StandardStatus> {
        self.statuses.get(standard_id).copied()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in self.statuses.values() {
            match status {
                StandardStatus::Done => counts.done += 1,
                StandardStatus::Gap => counts.gap += 1,
                StandardStatus::Failed => counts.failed += 1,
                StandardStatus::NotAttempted => counts.not_attempted += 1,
            }
        }
        counts
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
