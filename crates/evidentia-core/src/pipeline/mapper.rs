//! Mapper agent: selects the evidence each standard will cite.

use std::collections::BTreeMap;

use super::context::{ContextDelta, EvidenceAssignment};
use crate::config::MapperConfig;
use crate::model::StandardMatch;

#[derive(Debug, Clone)]
pub struct Mapper {
    config: MapperConfig,
}

impl Mapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    /// Top-K of the ranked candidates, plus every strong candidate past K
    pub fn assign(&self, ranked: &[StandardMatch]) -> EvidenceAssignment {
        let threshold = self.config.strong_evidence_threshold;
        let selected: Vec<StandardMatch> = ranked
            .iter()
            .enumerate()
            .filter(|(rank, m)| *rank < self.config.top_k || m.confidence >= threshold)
            .map(|(_, m)| m.clone())
            .collect();
        let strong = selected
            .iter()
            .filter(|m| m.confidence >= threshold)
            .map(|m| m.evidence_id.clone())
            .collect();

        EvidenceAssignment { selected, strong }
    }

    /// Assign evidence to every standard in `scope`; standards without
    /// candidates get an empty assignment.
    pub fn run(
        &self,
        scope: &[String],
        candidates: &BTreeMap<String, Vec<StandardMatch>>,
    ) -> ContextDelta {
        let matches = scope
            .iter()
            .map(|id| {
                let ranked = candidates.get(id).map(Vec::as_slice).unwrap_or(&[]);
                (id.clone(), self.assign(ranked))
            })
            .collect();

        ContextDelta {
            matches,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rank_matches;
    use std::collections::BTreeSet;

    fn ranked(confidences: &[f64]) -> Vec<StandardMatch> {
        let mut v: Vec<StandardMatch> = confidences
            .iter()
            .enumerate()
            .map(|(i, c)| StandardMatch::new("s", format!("ev-{i}"), *c, *c, vec![], BTreeSet::new()))
            .collect();
        rank_matches(&mut v);
        v
    }

    #[test]
    fn keeps_strong_evidence_beyond_k() {
        let mapper = Mapper::new(MapperConfig {
            top_k: 2,
            strong_evidence_threshold: 0.9,
        });
        let assignment = mapper.assign(&ranked(&[0.95, 0.94, 0.93, 0.8, 0.75]));
        assert_eq!(assignment.selected.len(), 3);
        assert_eq!(assignment.strong.len(), 3);
        assert!(!assignment.contains("ev-3"));
    }

    #[test]
    fn top_k_without_strong_evidence() {
        let mapper = Mapper::new(MapperConfig::default());
        let assignment = mapper.assign(&ranked(&[0.8, 0.85, 0.76, 0.78]));
        let ids = assignment.evidence_ids();
        assert_eq!(ids, vec!["ev-1", "ev-0", "ev-3"]);
        assert!(assignment.strong.is_empty());
    }

    #[test]
    fn every_scoped_standard_gets_an_assignment() {
        let mapper = Mapper::new(MapperConfig::default());
        let mut candidates = BTreeMap::new();
        candidates.insert("a".to_string(), ranked(&[0.8]));
        let delta = mapper.run(&["a".to_string(), "b".to_string()], &candidates);
        assert_eq!(delta.matches.len(), 2);
        assert!(delta.matches["b"].is_empty());
    }
}
