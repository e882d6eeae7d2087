//! Audit trail
//!
//! Append-only, hash-chained record of every pipeline decision for one
//! run. Each record's hash covers its own fields and the previous record's
//! hash; the first record chains to a genesis hash derived from the run id,
//! so records cannot be moved between runs without breaking verification.

pub mod sqlite;
pub mod store;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use sqlite::SqliteAuditStore;
pub use store::{AuditStore, MemoryAuditStore};

use crate::types::{now, Blake3Hash, Timestamp};

/// Agent responsible for a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    Matcher,
    Mapper,
    GapFinder,
    Narrator,
    Verifier,
}

impl AuditActor {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditActor::Matcher => "matcher",
            AuditActor::Mapper => "mapper",
            AuditActor::GapFinder => "gap_finder",
            AuditActor::Narrator => "narrator",
            AuditActor::Verifier => "verifier",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matcher" => Some(AuditActor::Matcher),
            "mapper" => Some(AuditActor::Mapper),
            "gap_finder" => Some(AuditActor::GapFinder),
            "narrator" => Some(AuditActor::Narrator),
            "verifier" => Some(AuditActor::Verifier),
            _ => None,
        }
    }
}

impl fmt::Display for AuditActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 1-based, contiguous within a run
    pub sequence_number: u64,
    pub actor: AuditActor,
    pub action: String,
    pub input_refs: Vec<String>,
    pub output_refs: Vec<String>,
    pub timestamp: Timestamp,
    pub prior_hash: Blake3Hash,
    pub record_hash: Blake3Hash,
}

const FIELD_SEP: u8 = 0x1e;
const ITEM_SEP: u8 = 0x1f;

impl AuditRecord {
    /// Recompute the hash over every field except `record_hash`
    pub fn compute_hash(&self) -> Blake3Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.sequence_number.to_be_bytes());
        hasher.update(&[FIELD_SEP]);
        hasher.update(self.actor.as_str().as_bytes());
        hasher.update(&[FIELD_SEP]);
        hasher.update(self.action.as_bytes());
        for refs in [&self.input_refs, &self.output_refs] {
            hasher.update(&[FIELD_SEP]);
            for r in refs {
                hasher.update(r.as_bytes());
                hasher.update(&[ITEM_SEP]);
            }
        }
        hasher.update(&[FIELD_SEP]);
        hasher.update(
            self.timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        hasher.update(&[FIELD_SEP]);
        hasher.update(self.prior_hash.as_bytes());
        hasher.finalize().into()
    }

    /// Whether this record concerns `standard_id`
    pub fn concerns(&self, standard_id: &str) -> bool {
        self.output_refs.iter().any(|r| r == standard_id)
    }
}

/// A single verification failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainIssue {
    SequenceGap { sequence: u64, expected: u64 },
    PriorHashMismatch { sequence: u64 },
    RecordHashMismatch { sequence: u64 },
}

impl ChainIssue {
    /// Sequence number of the offending record
    pub fn sequence(&self) -> u64 {
        match self {
            ChainIssue::SequenceGap { sequence, .. }
            | ChainIssue::PriorHashMismatch { sequence }
            | ChainIssue::RecordHashMismatch { sequence } => *sequence,
        }
    }
}

impl fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIssue::SequenceGap { sequence, expected } => {
                write!(f, "record {sequence}: expected sequence {expected}")
            }
            ChainIssue::PriorHashMismatch { sequence } => {
                write!(f, "record {sequence}: prior hash does not match previous record")
            }
            ChainIssue::RecordHashMismatch { sequence } => {
                write!(f, "record {sequence}: record hash does not match contents")
            }
        }
    }
}

/// Result of recomputing a trail's hash chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub checked: usize,
    pub issues: Vec<ChainIssue>,
}

/// Hash chain of one run's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    run_id: String,
    records: Vec<AuditRecord>,
}

impl AuditTrail {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            records: Vec::new(),
        }
    }

    /// Rebuild a trail from stored records without verifying it
    pub fn from_records(run_id: impl Into<String>, records: Vec<AuditRecord>) -> Self {
        Self {
            run_id: run_id.into(),
            records,
        }
    }

    /// Prior hash of the first record in a run
    pub fn genesis_hash(run_id: &str) -> Blake3Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"evidentia-audit-genesis");
        hasher.update(&[FIELD_SEP]);
        hasher.update(run_id.as_bytes());
        hasher.finalize().into()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hash the next record will chain to
    pub fn head_hash(&self) -> Blake3Hash {
        self.records
            .last()
            .map(|r| r.record_hash)
            .unwrap_or_else(|| Self::genesis_hash(&self.run_id))
    }

    /// Append a record and return it
    pub fn append(
        &mut self,
        actor: AuditActor,
        action: impl Into<String>,
        input_refs: Vec<String>,
        output_refs: Vec<String>,
    ) -> &AuditRecord {
        let mut record = AuditRecord {
            sequence_number: self.records.len() as u64 + 1,
            actor,
            action: action.into(),
            input_refs,
            output_refs,
            timestamp: now(),
            prior_hash: self.head_hash(),
            record_hash: Blake3Hash::empty(),
        };
        record.record_hash = record.compute_hash();
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Recompute every hash and check chain continuity
    pub fn verify(&self) -> ChainVerification {
        let mut issues = Vec::new();
        let mut expected_prior = Self::genesis_hash(&self.run_id);

        for (i, record) in self.records.iter().enumerate() {
            let expected_sequence = i as u64 + 1;
            if record.sequence_number != expected_sequence {
                issues.push(ChainIssue::SequenceGap {
                    sequence: record.sequence_number,
                    expected: expected_sequence,
                });
            }
            if record.prior_hash != expected_prior {
                issues.push(ChainIssue::PriorHashMismatch {
                    sequence: record.sequence_number,
                });
            }
            if record.compute_hash() != record.record_hash {
                issues.push(ChainIssue::RecordHashMismatch {
                    sequence: record.sequence_number,
                });
            }
            expected_prior = record.record_hash;
        }

        ChainVerification {
            valid: issues.is_empty(),
            checked: self.records.len(),
            issues,
        }
    }

    /// Records whose outputs reference `standard_id`, in chain order
    pub fn for_standard(&self, standard_id: &str) -> Vec<AuditRecord> {
        self.records
            .iter()
            .filter(|r| r.concerns(standard_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail() -> AuditTrail {
        let mut trail = AuditTrail::new("run-1");
        trail.append(
            AuditActor::Matcher,
            "matched 1 candidate",
            vec!["ev-1".into()],
            vec!["3.3.1".into()],
        );
        trail.append(
            AuditActor::Mapper,
            "stage matching -> mapping",
            vec![],
            vec!["3.3.1".into(), "4.1".into()],
        );
        trail.append(AuditActor::GapFinder, "gap", vec![], vec!["4.1".into()]);
        trail
    }

    #[test]
    fn fresh_trail_verifies() {
        let trail = trail();
        let verification = trail.verify();
        assert!(verification.valid);
        assert_eq!(verification.checked, 3);
        assert_eq!(trail.records()[0].prior_hash, AuditTrail::genesis_hash("run-1"));
        assert_eq!(trail.records()[1].prior_hash, trail.records()[0].record_hash);
    }

    #[test]
    fn tampered_action_is_detected() {
        let mut records = trail().into_records();
        records[1].action = "stage matching -> done".into();
        let verification = AuditTrail::from_records("run-1", records).verify();
        assert!(!verification.valid);
        assert_eq!(
            verification.issues,
            vec![ChainIssue::RecordHashMismatch { sequence: 2 }]
        );
    }

    #[test]
    fn deleted_record_is_detected() {
        let mut records = trail().into_records();
        records.remove(1);
        let verification = AuditTrail::from_records("run-1", records).verify();
        assert!(!verification.valid);
        assert!(verification
            .issues
            .contains(&ChainIssue::PriorHashMismatch { sequence: 3 }));
    }

    #[test]
    fn records_do_not_verify_under_another_run() {
        let records = trail().into_records();
        assert!(!AuditTrail::from_records("run-2", records).verify().valid);
    }

    #[test]
    fn filters_by_standard() {
        let trail = trail();
        let sub: Vec<u64> = trail
            .for_standard("4.1")
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(sub, vec![2, 3]);
    }

    #[test]
    fn actor_round_trips_through_str() {
        for actor in [
            AuditActor::Matcher,
            AuditActor::Mapper,
            AuditActor::GapFinder,
            AuditActor::Narrator,
            AuditActor::Verifier,
        ] {
            assert_eq!(AuditActor::parse(actor.as_str()), Some(actor));
        }
    }
}
