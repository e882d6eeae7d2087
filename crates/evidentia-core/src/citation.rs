//! Citation Generator
//!
//! Deterministic, human-readable citation strings built from a
//! `StandardMatch` and its `EvidenceDocument`:
//!
//! ```text
//! {title} ({evidence_type}, {collection_date:%Y-%m-%d}[, p. N | , pp. N, N, N | , pp. N-M])
//! ```
//!
//! Page suffix rules:
//! - 0 pages: no suffix (document-level reference)
//! - 1 page: `p. N`
//! - 2-3 pages: `pp. ` + ascending comma-joined list
//! - 4+ pages: `pp. {min}-{max}`
//!
//! The 4+ shorthand is emitted even when the pages are not contiguous.
//! Consumers compare against this exact format, so it must not be
//! "corrected" here.

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{EvidenceDocument, StandardMatch};

lazy_static! {
    /// `--- Page <int> ---`, case-insensitive
    pub(crate) static ref PAGE_MARKER: Regex =
        Regex::new(r"(?i)--- page (\d+) ---").expect("page marker pattern is valid");
}

/// A formatted reference from narrative text to one evidence document.
///
/// Narrative text refers to citations by `[marker]`; the citation string
/// itself is never spliced into the prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based marker used in the narrative text
    pub marker: usize,
    pub evidence_id: String,
    pub page_numbers: Vec<u32>,
    /// Rendered citation string
    pub text: String,
}

impl Citation {
    /// Build the citation for `m` against its evidence document
    pub fn for_match(marker: usize, m: &StandardMatch, document: &EvidenceDocument) -> Self {
        Self {
            marker,
            evidence_id: m.evidence_id.clone(),
            page_numbers: m.page_numbers.clone(),
            text: format_citation(document, &m.page_numbers),
        }
    }

    /// Marker as it appears in narrative text, e.g. `[2]`
    pub fn marker_label(&self) -> String {
        format!("[{}]", self.marker)
    }
}

/// Page markers in document order, duplicates and disorder preserved
pub fn page_markers_in_order(content: &str) -> Vec<u32> {
    PAGE_MARKER
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .collect()
}

/// All page numbers marked in `content`, deduplicated and ascending.
///
/// Text without markers yields an empty list.
pub fn extract_page_numbers(content: &str) -> Vec<u32> {
    let pages: BTreeSet<u32> = page_markers_in_order(content).into_iter().collect();
    pages.into_iter().collect()
}

/// Page suffix for a citation, without the leading comma
pub fn format_pages(pages: &[u32]) -> Option<String> {
    let pages: Vec<u32> = pages
        .iter()
        .copied()
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect();

    match pages.len() {
        0 => None,
        1 => Some(format!("p. {}", pages[0])),
        2 | 3 => Some(format!("pp. {}", pages.iter().join(", "))),
        _ => Some(format!("pp. {}-{}", pages[0], pages[pages.len() - 1])),
    }
}

/// Render the citation string for `document` at `pages`
pub fn format_citation(document: &EvidenceDocument, pages: &[u32]) -> String {
    let mut out = format!(
        "{} ({}, {}",
        document.title,
        document.evidence_type,
        document.collection_date.format("%Y-%m-%d")
    );
    if let Some(suffix) = format_pages(pages) {
        out.push_str(", ");
        out.push_str(&suffix);
    }
    out.push(')');
    out
}
