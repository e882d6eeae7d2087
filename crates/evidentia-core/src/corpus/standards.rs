//! Standards corpus
//!
//! A validated, read-only standards tree. Construction rejects the whole
//! corpus on any structural problem.
//!
//! # Invariants
//!
//! - Standard ids are unique
//! - Codes are unique per accreditor
//! - Every `parent_id` refers to a standard in the corpus
//! - The parent relation is acyclic

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::CorpusError;
use crate::model::Standard;

#[derive(Debug, Clone, Default)]
pub struct StandardsCorpus {
    standards: BTreeMap<String, Standard>,
    children: HashMap<String, Vec<String>>,
}

impl StandardsCorpus {
    /// Validate and index a set of standards.
    ///
    /// # Errors
    ///
    /// - `DuplicateId` / `DuplicateCode` on collisions
    /// - `UnknownParent` if a parent id is missing
    /// - `Cycle` if the parent relation loops
    pub fn new(standards: Vec<Standard>) -> Result<Self, CorpusError> {
        let mut by_id: BTreeMap<String, Standard> = BTreeMap::new();
        let mut codes: HashSet<(String, String)> = HashSet::new();

        for standard in standards {
            if !codes.insert((standard.accreditor.clone(), standard.code.clone())) {
                return Err(CorpusError::DuplicateCode {
                    accreditor: standard.accreditor.clone(),
                    code: standard.code.clone(),
                });
            }
            if by_id.contains_key(&standard.id) {
                return Err(CorpusError::DuplicateId(standard.id.clone()));
            }
            by_id.insert(standard.id.clone(), standard);
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for standard in by_id.values() {
            if let Some(parent) = &standard.parent_id {
                if !by_id.contains_key(parent) {
                    return Err(CorpusError::UnknownParent {
                        child: standard.id.clone(),
                        parent: parent.clone(),
                    });
                }
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(standard.id.clone());
            }
        }

        detect_cycle(&by_id)?;

        for ids in children.values_mut() {
            ids.sort();
        }

        Ok(Self {
            standards: by_id,
            children,
        })
    }

    /// Parse a JSON array of standards and validate it
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let standards: Vec<Standard> = serde_json::from_str(json)?;
        Ok(Self::new(standards)?)
    }

    pub fn get(&self, id: &str) -> Option<&Standard> {
        self.standards.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.standards.contains_key(id)
    }

    /// Look up a standard by accreditor and code
    pub fn by_code(&self, accreditor: &str, code: &str) -> Option<&Standard> {
        self.standards
            .values()
            .find(|s| s.accreditor == accreditor && s.code == code)
    }

    /// Standards in id order
    pub fn iter(&self) -> impl Iterator<Item = &Standard> {
        self.standards.values()
    }

    pub fn len(&self) -> usize {
        self.standards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standards.is_empty()
    }

    /// Every code in the corpus, across accreditors
    pub fn codes(&self) -> BTreeSet<String> {
        self.standards.values().map(|s| s.code.clone()).collect()
    }

    /// Direct children of `id`, sorted by id
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: &str) -> Vec<&Standard> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|s| s.parent_id.as_deref());
        while let Some(parent_id) = current {
            match self.get(parent_id) {
                Some(parent) => {
                    out.push(parent);
                    current = parent.parent_id.as_deref();
                }
                None => break,
            }
        }
        out
    }

    /// Root standards (no parent)
    pub fn roots(&self) -> Vec<&Standard> {
        self.standards
            .values()
            .filter(|s| s.parent_id.is_none())
            .collect()
    }

    /// Standards of one accreditor
    pub fn for_accreditor<'a>(&'a self, accreditor: &'a str) -> impl Iterator<Item = &'a Standard> {
        self.standards
            .values()
            .filter(move |s| s.accreditor == accreditor)
    }

    /// Expand a scope to include every descendant of the given ids.
    ///
    /// Output keeps first-seen order and holds each id once. Unknown ids are
    /// kept so the run can report them.
    pub fn expand_scope(&self, ids: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<String> = ids.iter().rev().cloned().collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for child in self.children(&id).iter().rev() {
                stack.push(child.clone());
            }
            out.push(id);
        }
        out
    }
}

/// Reject parent relations that loop back on themselves
fn detect_cycle(standards: &BTreeMap<String, Standard>) -> Result<(), CorpusError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for id in standards.keys() {
        nodes.insert(id.as_str(), graph.add_node(id.as_str()));
    }
    for standard in standards.values() {
        if let Some(parent) = &standard.parent_id {
            if parent == &standard.id {
                return Err(CorpusError::Cycle(vec![standard.id.clone()]));
            }
            graph.add_edge(nodes[parent.as_str()], nodes[standard.id.as_str()], ());
        }
    }

    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut members: Vec<String> =
                component.iter().map(|idx| graph[*idx].to_string()).collect();
            members.sort();
            return Err(CorpusError::Cycle(members));
        }
    }
    Ok(())
}
