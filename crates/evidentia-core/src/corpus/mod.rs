//! Standards and evidence corpora
//!
//! Corpora are validated on construction and read-only afterwards. The
//! `CorpusRegistry` hot-swaps them between runs: a run takes a snapshot
//! when it starts and never sees a later reload.

pub mod evidence;
pub mod standards;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub use evidence::EvidenceCorpus;
pub use standards::StandardsCorpus;

use crate::model::{EvidenceDocument, Standard};

/// Consistent view of both corpora for one run
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    pub standards: Arc<StandardsCorpus>,
    pub evidence: Arc<EvidenceCorpus>,
    /// Registry generation the snapshot was taken at
    pub generation: u64,
}

/// Holder of the currently active corpora
#[derive(Debug, Default)]
pub struct CorpusRegistry {
    standards: RwLock<Arc<StandardsCorpus>>,
    evidence: RwLock<Arc<EvidenceCorpus>>,
    generation: AtomicU64,
}

impl CorpusRegistry {
    pub fn new(standards: StandardsCorpus, evidence: EvidenceCorpus) -> Self {
        Self {
            standards: RwLock::new(Arc::new(standards)),
            evidence: RwLock::new(Arc::new(evidence)),
            generation: AtomicU64::new(1),
        }
    }

    /// Replace the standards corpus.
    ///
    /// # Errors
    ///
    /// Returns the integrity error and leaves the previous corpus active if
    /// the new standards do not validate.
    pub fn reload_standards(&self, standards: Vec<Standard>) -> crate::Result<u64> {
        let corpus = match StandardsCorpus::new(standards) {
            Ok(corpus) => corpus,
            Err(e) => {
                warn!(error = %e, "standards reload rejected, keeping previous corpus");
                return Err(e.into());
            }
        };
        let count = corpus.len();
        *self.standards.write() = Arc::new(corpus);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(standards = count, generation, "standards corpus reloaded");
        Ok(generation)
    }

    /// Replace the evidence corpus.
    ///
    /// # Errors
    ///
    /// Returns the validation error and leaves the previous corpus active.
    pub fn reload_evidence(&self, documents: Vec<EvidenceDocument>) -> crate::Result<u64> {
        let corpus = match EvidenceCorpus::new(documents) {
            Ok(corpus) => corpus,
            Err(e) => {
                warn!(error = %e, "evidence reload rejected, keeping previous corpus");
                return Err(e);
            }
        };
        let count = corpus.len();
        *self.evidence.write() = Arc::new(corpus);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(documents = count, generation, "evidence corpus reloaded");
        Ok(generation)
    }

    /// Snapshot both corpora for a run
    pub fn snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot {
            standards: self.standards.read().clone(),
            evidence: self.evidence.read().clone(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    pub fn standards(&self) -> Arc<StandardsCorpus> {
        self.standards.read().clone()
    }

    pub fn evidence(&self) -> Arc<EvidenceCorpus> {
        self.evidence.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard(id: &str, parent: Option<&str>) -> Standard {
        let mut builder = Standard::builder().id(id).code(id).title("Title");
        if let Some(parent) = parent {
            builder = builder.parent(parent);
        }
        builder.build().unwrap()
    }

    #[test]
    fn failed_reload_keeps_previous_corpus() {
        let registry = CorpusRegistry::new(
            StandardsCorpus::new(vec![standard("1", None)]).unwrap(),
            EvidenceCorpus::default(),
        );

        let cyclic = vec![standard("a", Some("b")), standard("b", Some("a"))];
        assert!(registry.reload_standards(cyclic).is_err());
        assert!(registry.standards().contains("1"));
        assert_eq!(registry.snapshot().generation, 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_reloads() {
        let registry = CorpusRegistry::new(
            StandardsCorpus::new(vec![standard("1", None)]).unwrap(),
            EvidenceCorpus::default(),
        );
        let before = registry.snapshot();

        let generation = registry.reload_standards(vec![standard("2", None)]).unwrap();
        assert_eq!(generation, 2);
        assert!(before.standards.contains("1"));
        assert!(registry.standards().contains("2"));
        assert!(!registry.standards().contains("1"));
    }
}
