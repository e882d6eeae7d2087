//! Verifier agent
//!
//! Accepts a narrative only when every citation resolves to assigned
//! evidence, every strong item is cited, every `[n]` marker has a citation
//! and no out-of-scope standard code appears in the text.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::context::{
    ContextDelta, EvidenceAssignment, Narrative, PipelineContext, VerificationIssue,
    VerificationResult,
};

lazy_static! {
    static ref MARKER: Regex = Regex::new(r"\[(\d+)\]").expect("marker pattern is valid");
}

#[derive(Debug, Clone, Default)]
pub struct Verifier {
    /// Codes known to the corpus but outside this run's scope
    forbidden_codes: BTreeSet<String>,
}

impl Verifier {
    pub fn new(corpus_codes: &BTreeSet<String>, scope_codes: &BTreeSet<String>) -> Self {
        Self {
            forbidden_codes: corpus_codes.difference(scope_codes).cloned().collect(),
        }
    }

    pub fn verify(&self, assignment: &EvidenceAssignment, narrative: &Narrative) -> VerificationResult {
        let mut issues = Vec::new();

        for citation in &narrative.citations {
            if !assignment.contains(&citation.evidence_id) {
                issues.push(VerificationIssue::OrphanCitation {
                    marker: citation.marker,
                    evidence_id: citation.evidence_id.clone(),
                });
            }
        }

        let cited: BTreeSet<&str> = narrative
            .citations
            .iter()
            .map(|c| c.evidence_id.as_str())
            .collect();
        for evidence_id in &assignment.strong {
            if !cited.contains(evidence_id.as_str()) {
                issues.push(VerificationIssue::UncitedStrongEvidence {
                    evidence_id: evidence_id.clone(),
                });
            }
        }

        let markers: BTreeSet<usize> = narrative.citations.iter().map(|c| c.marker).collect();
        let dangling: BTreeSet<usize> = MARKER
            .captures_iter(&narrative.text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
            .filter(|marker| !markers.contains(marker))
            .collect();
        issues.extend(
            dangling
                .into_iter()
                .map(|marker| VerificationIssue::DanglingMarker { marker }),
        );

        for code in &self.forbidden_codes {
            if mentions_code(&narrative.text, code) {
                issues.push(VerificationIssue::OutOfScopeReference { code: code.clone() });
            }
        }

        VerificationResult::from_issues(issues)
    }

    /// Verify every narrative drafted this run
    pub fn run(&self, ctx: &PipelineContext, drafted: &BTreeSet<String>) -> ContextDelta {
        let empty = EvidenceAssignment::default();
        let verification_results: BTreeMap<String, VerificationResult> = drafted
            .iter()
            .filter_map(|id| {
                let narrative = ctx.narratives.get(id)?;
                let assignment = ctx.matches.get(id).unwrap_or(&empty);
                Some((id.clone(), self.verify(assignment, narrative)))
            })
            .collect();

        ContextDelta {
            verification_results,
            ..Default::default()
        }
    }
}

/// Whether `code` occurs in `text` as a whole token: not glued to letters or
/// digits, and not the prefix of a longer dotted code.
fn mentions_code(text: &str, code: &str) -> bool {
    if code.is_empty() {
        return false;
    }
    text.match_indices(code).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let mut after = text[start + code.len()..].chars();
        let next = after.next();
        let following = after.next();

        let clean_start = !before.map(|c| c.is_alphanumeric() || c == '.').unwrap_or(false);
        let clean_end = match next {
            None => true,
            Some(c) if c.is_alphanumeric() => false,
            Some('.') => !following.map(char::is_alphanumeric).unwrap_or(false),
            Some(_) => true,
        };
        clean_start && clean_end
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::Citation;
    use crate::model::StandardMatch;

    fn citation(marker: usize, evidence_id: &str) -> Citation {
        Citation {
            marker,
            evidence_id: evidence_id.to_string(),
            page_numbers: vec![],
            text: format!("{evidence_id} (report, 2024-01-01)"),
        }
    }

    fn assignment(ids: &[&str], strong: &[&str]) -> EvidenceAssignment {
        EvidenceAssignment {
            selected: ids
                .iter()
                .map(|id| StandardMatch::new("s", *id, 0.9, 0.9, vec![], BTreeSet::new()))
                .collect(),
            strong: strong.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn narrative(text: &str, citations: Vec<Citation>) -> Narrative {
        Narrative {
            text: text.to_string(),
            citations,
            insufficient_evidence: false,
        }
    }

    fn codes(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn clean_narrative_passes() {
        let verifier = Verifier::new(&codes(&["3.3.1", "4.1"]), &codes(&["3.3.1"]));
        let result = verifier.verify(
            &assignment(&["a", "b"], &["a"]),
            &narrative("Standard 3.3.1 is met [1] [2].", vec![citation(1, "a"), citation(2, "b")]),
        );
        assert!(result.passed, "{:?}", result.issues);
    }

    #[test]
    fn rejects_orphan_citation() {
        let verifier = Verifier::default();
        let result = verifier.verify(
            &assignment(&["a"], &[]),
            &narrative("Met [1] [2].", vec![citation(1, "a"), citation(2, "zzz")]),
        );
        assert!(!result.passed);
        assert_eq!(
            result.issues,
            vec![VerificationIssue::OrphanCitation {
                marker: 2,
                evidence_id: "zzz".into()
            }]
        );
    }

    #[test]
    fn rejects_dropped_strong_evidence() {
        let verifier = Verifier::default();
        let result = verifier.verify(
            &assignment(&["a", "b"], &["b"]),
            &narrative("Met [1].", vec![citation(1, "a")]),
        );
        assert_eq!(
            result.issues,
            vec![VerificationIssue::UncitedStrongEvidence {
                evidence_id: "b".into()
            }]
        );
    }

    #[test]
    fn rejects_dangling_markers() {
        let verifier = Verifier::default();
        let result = verifier.verify(
            &assignment(&["a"], &[]),
            &narrative("Met [1] and [3], also [3].", vec![citation(1, "a")]),
        );
        assert_eq!(result.issues, vec![VerificationIssue::DanglingMarker { marker: 3 }]);
    }

    #[test]
    fn rejects_out_of_scope_codes() {
        let verifier = Verifier::new(&codes(&["3.3.1", "4.1", "3.3"]), &codes(&["3.3.1"]));
        let result = verifier.verify(
            &assignment(&["a"], &[]),
            &narrative("See 3.3.1 and also standard 4.1. [1]", vec![citation(1, "a")]),
        );
        assert_eq!(
            result.issues,
            vec![VerificationIssue::OutOfScopeReference { code: "4.1".into() }]
        );
    }

    #[test]
    fn code_matching_respects_token_boundaries() {
        assert!(mentions_code("standard 4.1 applies", "4.1"));
        assert!(mentions_code("(4.1)", "4.1"));
        assert!(mentions_code("ends with 4.1.", "4.1"));
        assert!(!mentions_code("standard 4.1.2 applies", "4.1"));
        assert!(!mentions_code("standard 14.1 applies", "4.1"));
        assert!(!mentions_code("version 3.3.1", "3.3"));
    }
}
