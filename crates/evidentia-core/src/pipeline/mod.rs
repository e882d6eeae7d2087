//! Multi-agent evidence pipeline
//!
//! An explicit state machine driven by one orchestrator:
//!
//! ```text
//! Matching -> Mapping -> GapAnalysis -> Narrating -> Verifying -> Done
//!     \__________\___________\_____________\____________\----> Failed
//! ```
//!
//! Each stage is a plain function over the run's `PipelineContext` that
//! returns a `ContextDelta`; the orchestrator merges deltas, records one
//! audit entry per transition and one per per-standard decision.

pub mod chat;
pub mod context;
pub mod gap_finder;
pub mod mapper;
pub mod narrator;
pub mod orchestrator;
pub mod report;
pub mod verifier;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use chat::ChatCompletionNarrator;
pub use context::{
    ContextDelta, EvidenceAssignment, Narrative, PipelineContext, VerificationIssue,
    VerificationResult,
};
pub use gap_finder::GapFinder;
pub use mapper::Mapper;
pub use narrator::{NarrativeProvider, NarrativeRequest, Narrator, TemplateNarrator};
pub use orchestrator::{EvidencePipeline, RunRequest};
pub use report::RunReport;
pub use verifier::Verifier;

use crate::audit::AuditActor;

/// Pipeline stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Matching,
    Mapping,
    GapAnalysis,
    Narrating,
    Verifying,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn can_transition_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (Matching, Mapping)
            | (Mapping, GapAnalysis)
            | (GapAnalysis, Narrating)
            | (Narrating, Verifying)
            | (Verifying, Done) => true,
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    /// Agent that owns the work of this stage
    pub fn actor(self) -> AuditActor {
        match self {
            PipelineStage::Matching => AuditActor::Matcher,
            PipelineStage::Mapping => AuditActor::Mapper,
            PipelineStage::GapAnalysis => AuditActor::GapFinder,
            PipelineStage::Narrating => AuditActor::Narrator,
            PipelineStage::Verifying | PipelineStage::Done | PipelineStage::Failed => {
                AuditActor::Verifier
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Matching => "matching",
            PipelineStage::Mapping => "mapping",
            PipelineStage::GapAnalysis => "gap_analysis",
            PipelineStage::Narrating => "narrating",
            PipelineStage::Verifying => "verifying",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one standard within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardStatus {
    /// Narrative drafted and verified
    Done,
    /// Not enough evidence; received the insufficient-evidence statement
    Gap,
    /// Narrative generation or verification failed, or the id is unknown
    Failed,
    /// Cancelled before the standard was started
    NotAttempted,
}

impl fmt::Display for StandardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StandardStatus::Done => "done",
            StandardStatus::Gap => "gap",
            StandardStatus::Failed => "failed",
            StandardStatus::NotAttempted => "not_attempted",
        };
        f.write_str(s)
    }
}
