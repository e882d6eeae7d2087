//! Evidence corpus
//!
//! Validated, read-only collection of evidence documents. Superseded
//! versions stay in the corpus for provenance but are hidden from matching.

use std::collections::{BTreeMap, HashSet};

use crate::error::{CorpusError, EvidentiaError};
use crate::model::EvidenceDocument;

#[derive(Debug, Clone, Default)]
pub struct EvidenceCorpus {
    documents: BTreeMap<String, EvidenceDocument>,
    superseded: HashSet<String>,
}

impl EvidenceCorpus {
    /// Validate and index a set of documents.
    ///
    /// # Errors
    ///
    /// - `Evidence` if any document violates the page-marker invariant
    /// - `DuplicateEvidence` on id collisions
    /// - `UnknownSupersededDocument` if a document supersedes an id that is
    ///   not in the corpus
    pub fn new(documents: Vec<EvidenceDocument>) -> crate::Result<Self> {
        let mut by_id = BTreeMap::new();
        for document in documents {
            document.validate()?;
            if by_id.contains_key(&document.id) {
                return Err(CorpusError::DuplicateEvidence(document.id.clone()).into());
            }
            by_id.insert(document.id.clone(), document);
        }

        let mut superseded = HashSet::new();
        for document in by_id.values() {
            if let Some(previous) = &document.supersedes {
                if !by_id.contains_key(previous) {
                    return Err(EvidentiaError::from(CorpusError::UnknownSupersededDocument {
                        document: document.id.clone(),
                        superseded: previous.clone(),
                    }));
                }
                superseded.insert(previous.clone());
            }
        }

        Ok(Self {
            documents: by_id,
            superseded,
        })
    }

    /// Parse a JSON array of documents and validate it
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let documents: Vec<EvidenceDocument> = serde_json::from_str(json)?;
        Self::new(documents)
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceDocument> {
        self.documents.get(id)
    }

    /// Every document, including superseded versions, in id order
    pub fn iter(&self) -> impl Iterator<Item = &EvidenceDocument> {
        self.documents.values()
    }

    /// Documents eligible for matching, in id order
    pub fn active_documents(&self) -> Vec<&EvidenceDocument> {
        self.documents
            .values()
            .filter(|d| !self.superseded.contains(&d.id))
            .collect()
    }

    pub fn is_superseded(&self, id: &str) -> bool {
        self.superseded.contains(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
