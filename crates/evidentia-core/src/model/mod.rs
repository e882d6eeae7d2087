//! Evidence/standard data model
//!
//! Immutable value types shared by every pipeline stage:
//! - `EvidenceDocument`: page-annotated source document
//! - `Standard`: a node in an accreditor's requirement tree
//! - `StandardMatch`: a scored association between the two

pub mod evidence;
pub mod matching;
pub mod standard;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use evidence::{EvidenceDocument, EvidenceType};
pub use matching::{rank_matches, ScorerKind, StandardMatch};
pub use standard::{Standard, StandardBuilder};

/// Compliance domain a standard belongs to or evidence speaks to.
///
/// Evidence outside a standard's domain still matches, but its confidence
/// is discounted by the domain penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Mission,
    Governance,
    InstitutionalEffectiveness,
    Academics,
    Faculty,
    StudentSupport,
    Finance,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Domain::Mission => "mission",
            Domain::Governance => "governance",
            Domain::InstitutionalEffectiveness => "institutional_effectiveness",
            Domain::Academics => "academics",
            Domain::Faculty => "faculty",
            Domain::StudentSupport => "student_support",
            Domain::Finance => "finance",
        };
        f.write_str(label)
    }
}
