//! Run-scoped pipeline context and the deltas stages produce
//!
//! Stages never mutate the context directly: each returns a `ContextDelta`
//! and the orchestrator merges it. Merging only adds entries, so a later
//! stage can never overwrite an earlier stage's output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

use crate::citation::Citation;
use crate::model::StandardMatch;

/// Evidence the Mapper selected for one standard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceAssignment {
    /// Selected matches in rank order
    pub selected: Vec<StandardMatch>,
    /// Evidence ids at or above the strong-evidence threshold; always selected
    pub strong: BTreeSet<String>,
}

impl EvidenceAssignment {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, evidence_id: &str) -> bool {
        self.selected.iter().any(|m| m.evidence_id == evidence_id)
    }

    pub fn evidence_ids(&self) -> Vec<String> {
        self.selected.iter().map(|m| m.evidence_id.clone()).collect()
    }
}

/// Narrative prose and the citations its `[n]` markers point to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub citations: Vec<Citation>,
    /// True for the templated statement given to gap and failed standards
    #[serde(default)]
    pub insufficient_evidence: bool,
}

impl Narrative {
    /// Templated statement for a standard without usable evidence
    pub fn insufficient_evidence(label: &str) -> Self {
        Self {
            text: format!(
                "Insufficient evidence: no submitted evidence met the confidence threshold \
                 for {label}. Additional documentation is required before a compliance \
                 narrative can be written."
            ),
            citations: Vec::new(),
            insufficient_evidence: true,
        }
    }
}

/// One reason a narrative was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationIssue {
    /// Citation to evidence not assigned to the standard
    OrphanCitation { marker: usize, evidence_id: String },
    /// Strong evidence the narrative never cites
    UncitedStrongEvidence { evidence_id: String },
    /// Standard code outside the run's scope
    OutOfScopeReference { code: String },
    /// `[n]` in the text with no citation entry
    DanglingMarker { marker: usize },
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationIssue::OrphanCitation { marker, evidence_id } => write!(
                f,
                "citation [{marker}] references {evidence_id}, which is not assigned to this standard"
            ),
            VerificationIssue::UncitedStrongEvidence { evidence_id } => {
                write!(f, "strong evidence {evidence_id} is not cited")
            }
            VerificationIssue::OutOfScopeReference { code } => {
                write!(f, "narrative references standard {code}, which is outside the run scope")
            }
            VerificationIssue::DanglingMarker { marker } => {
                write!(f, "marker [{marker}] has no citation")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub issues: Vec<VerificationIssue>,
}

impl VerificationResult {
    pub fn from_issues(issues: Vec<VerificationIssue>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }
}

/// Everything one run has produced so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Standard ids in processing order, without duplicates
    pub standards_scope: Vec<String>,
    /// Raw ranked matcher output per standard
    pub candidates: BTreeMap<String, Vec<StandardMatch>>,
    /// Mapper selection per standard
    pub matches: BTreeMap<String, EvidenceAssignment>,
    pub narratives: BTreeMap<String, Narrative>,
    pub gaps: BTreeSet<String>,
    pub verification_results: BTreeMap<String, VerificationResult>,
}

impl PipelineContext {
    pub fn new(scope: impl IntoIterator<Item = String>) -> Self {
        let mut seen = BTreeSet::new();
        let standards_scope = scope
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self {
            standards_scope,
            ..Default::default()
        }
    }

    /// Merge a stage's output. Entries already present are kept.
    pub fn merge(&mut self, delta: ContextDelta) {
        merge_map(&mut self.candidates, delta.candidates, "candidates");
        merge_map(&mut self.matches, delta.matches, "matches");
        merge_map(&mut self.narratives, delta.narratives, "narratives");
        merge_map(
            &mut self.verification_results,
            delta.verification_results,
            "verification_results",
        );
        self.gaps.extend(delta.gaps);
    }

    pub fn is_gap(&self, standard_id: &str) -> bool {
        self.gaps.contains(standard_id)
    }
}

fn merge_map<V>(target: &mut BTreeMap<String, V>, source: BTreeMap<String, V>, field: &str) {
    for (key, value) in source {
        if target.contains_key(&key) {
            warn!(field, standard_id = %key, "ignoring attempt to overwrite context entry");
            continue;
        }
        target.insert(key, value);
    }
}

/// Output of one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDelta {
    pub candidates: BTreeMap<String, Vec<StandardMatch>>,
    pub matches: BTreeMap<String, EvidenceAssignment>,
    pub narratives: BTreeMap<String, Narrative>,
    pub gaps: BTreeSet<String>,
    pub verification_results: BTreeMap<String, VerificationResult>,
}
