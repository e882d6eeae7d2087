//! GapFinder agent
//!
//! A standard is a gap iff its assignment is empty or every assigned
//! confidence is below `min_confidence`. Gap standards receive the
//! insufficient-evidence statement and skip narrative drafting.

use std::collections::BTreeMap;

use super::context::{ContextDelta, EvidenceAssignment, Narrative};

#[derive(Debug, Clone, Default)]
pub struct GapFinder;

impl GapFinder {
    pub fn new() -> Self {
        Self
    }

    pub fn is_gap(assignment: &EvidenceAssignment, min_confidence: f64) -> bool {
        assignment
            .selected
            .iter()
            .all(|m| m.confidence < min_confidence)
    }

    /// `thresholds` carries the minimum confidence and display label for
    /// each standard to analyze.
    pub fn run(
        &self,
        matches: &BTreeMap<String, EvidenceAssignment>,
        thresholds: &BTreeMap<String, (f64, String)>,
    ) -> ContextDelta {
        let mut delta = ContextDelta::default();
        let empty = EvidenceAssignment::default();

        for (standard_id, (min_confidence, label)) in thresholds {
            let assignment = matches.get(standard_id).unwrap_or(&empty);
            if Self::is_gap(assignment, *min_confidence) {
                delta.gaps.insert(standard_id.clone());
                delta
                    .narratives
                    .insert(standard_id.clone(), Narrative::insufficient_evidence(label));
            }
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StandardMatch;
    use std::collections::BTreeSet;

    fn assignment(confidences: &[f64]) -> EvidenceAssignment {
        EvidenceAssignment {
            selected: confidences
                .iter()
                .enumerate()
                .map(|(i, c)| StandardMatch::new("s", format!("e{i}"), 1.0, *c, vec![], BTreeSet::new()))
                .collect(),
            strong: BTreeSet::new(),
        }
    }

    #[test]
    fn empty_and_weak_assignments_are_gaps() {
        assert!(GapFinder::is_gap(&assignment(&[]), 0.7));
        assert!(GapFinder::is_gap(&assignment(&[0.5, 0.69]), 0.7));
        assert!(!GapFinder::is_gap(&assignment(&[0.5, 0.7]), 0.7));
    }

    #[test]
    fn gaps_receive_insufficient_evidence_statement() {
        let mut matches = BTreeMap::new();
        matches.insert("a".to_string(), assignment(&[0.9]));
        matches.insert("b".to_string(), assignment(&[]));
        let mut thresholds = BTreeMap::new();
        thresholds.insert("a".to_string(), (0.7, "1.1 Mission".to_string()));
        thresholds.insert("b".to_string(), (0.7, "1.2 Vision".to_string()));

        let delta = GapFinder::new().run(&matches, &thresholds);
        assert_eq!(delta.gaps.iter().collect::<Vec<_>>(), vec!["b"]);
        assert!(delta.narratives["b"].insufficient_evidence);
        assert!(delta.narratives["b"].text.contains("1.2 Vision"));
        assert!(!delta.narratives.contains_key("a"));
    }
}
