//! Evidence documents
//!
//! An `EvidenceDocument` is immutable once constructed. Re-uploading a
//! document produces a new document with a new id and a higher `version`
//! that `supersedes` the old one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Domain;
use crate::citation::extract_page_numbers;
use crate::error::EvidenceError;

/// Kind of institutional evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    PolicyDocument,
    AssessmentData,
    GovernanceRecord,
    Syllabus,
    StrategicPlan,
    FinancialStatement,
    MeetingMinutes,
    Handbook,
    Report,
    Other,
}

impl EvidenceType {
    /// Snake-case label used in citations
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceType::PolicyDocument => "policy_document",
            EvidenceType::AssessmentData => "assessment_data",
            EvidenceType::GovernanceRecord => "governance_record",
            EvidenceType::Syllabus => "syllabus",
            EvidenceType::StrategicPlan => "strategic_plan",
            EvidenceType::FinancialStatement => "financial_statement",
            EvidenceType::MeetingMinutes => "meeting_minutes",
            EvidenceType::Handbook => "handbook",
            EvidenceType::Report => "report",
            EvidenceType::Other => "other",
        }
    }

    /// Domains this kind of evidence speaks to when a document does not
    /// declare one explicitly.
    pub fn default_domains(self) -> &'static [Domain] {
        use Domain::*;
        match self {
            EvidenceType::PolicyDocument => &[Governance, StudentSupport, Faculty],
            EvidenceType::AssessmentData => &[InstitutionalEffectiveness, Academics],
            EvidenceType::GovernanceRecord => &[Governance, Mission],
            EvidenceType::Syllabus => &[Academics, Faculty],
            EvidenceType::StrategicPlan => &[Mission, InstitutionalEffectiveness, Governance],
            EvidenceType::FinancialStatement => &[Finance],
            EvidenceType::MeetingMinutes => &[Governance],
            EvidenceType::Handbook => &[StudentSupport, Faculty],
            EvidenceType::Report => &[InstitutionalEffectiveness],
            EvidenceType::Other => &[],
        }
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source document submitted to demonstrate compliance.
///
/// `content` is page-annotated plain text: page boundaries are marked with
/// `--- Page N ---` lines, 1-indexed and strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub id: String,
    pub title: String,
    pub evidence_type: EvidenceType,
    pub content: String,
    pub page_count: u32,
    pub collection_date: NaiveDate,

    /// Explicit domain, overriding the evidence type's defaults
    #[serde(default)]
    pub domain: Option<Domain>,

    /// Version of the logical document (1 for the first upload)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Id of the document this one replaces
    #[serde(default)]
    pub supersedes: Option<String>,
}

fn default_version() -> u32 {
    1
}

impl EvidenceDocument {
    /// Create a validated evidence document.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the page markers are not strictly increasing, start
    /// at zero, or point past `page_count` (when `page_count` is non-zero).
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        evidence_type: EvidenceType,
        content: impl Into<String>,
        page_count: u32,
        collection_date: NaiveDate,
    ) -> Result<Self, EvidenceError> {
        let doc = Self {
            id: id.into(),
            title: title.into(),
            evidence_type,
            content: content.into(),
            page_count,
            collection_date,
            domain: None,
            version: 1,
            supersedes: None,
        };
        doc.validate()?;
        Ok(doc)
    }

    /// Declare an explicit domain
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Mark this document as a new version replacing `previous`
    pub fn superseding(mut self, previous: &EvidenceDocument) -> Self {
        self.version = previous.version + 1;
        self.supersedes = Some(previous.id.clone());
        self
    }

    /// Check the page marker invariant.
    ///
    /// Documents deserialized from a corpus file bypass `new`, so corpus
    /// construction calls this again.
    pub fn validate(&self) -> Result<(), EvidenceError> {
        let mut previous: Option<u32> = None;
        for page in crate::citation::page_markers_in_order(&self.content) {
            if page == 0 {
                return Err(EvidenceError::ZeroPageMarker(self.id.clone()));
            }
            if let Some(prev) = previous {
                if page <= prev {
                    return Err(EvidenceError::NonMonotonicPageMarkers {
                        document: self.id.clone(),
                        previous: prev,
                        page,
                    });
                }
            }
            if self.page_count > 0 && page > self.page_count {
                return Err(EvidenceError::PageBeyondCount {
                    document: self.id.clone(),
                    page,
                    page_count: self.page_count,
                });
            }
            previous = Some(page);
        }
        Ok(())
    }

    /// Pages that exist in this document according to its markers
    pub fn pages(&self) -> Vec<u32> {
        extract_page_numbers(&self.content)
    }

    /// Whether the content carries any page markers
    pub fn has_page_markers(&self) -> bool {
        !self.pages().is_empty()
    }

    /// Domains this document is relevant to
    pub fn domains(&self) -> Vec<Domain> {
        match self.domain {
            Some(domain) => vec![domain],
            None => self.evidence_type.default_domains().to_vec(),
        }
    }
}
