//! Audit trail persistence

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{AuditRecord, AuditTrail};
use crate::error::AuditError;

/// Append-only storage for run audit trails.
///
/// `save` only ever adds records: the stored chain must be a prefix of the
/// trail being saved, otherwise the save is rejected.
pub trait AuditStore: Send + Sync {
    /// Persist any records of `trail` not yet stored
    fn save(&self, trail: &AuditTrail) -> Result<(), AuditError>;

    /// Load the full trail of a run
    fn load(&self, run_id: &str) -> Result<AuditTrail, AuditError>;

    /// Ids of every stored run
    fn run_ids(&self) -> Result<Vec<String>, AuditError>;
}

/// Check that `stored` is a prefix of `trail` and return the records to add
pub(crate) fn unsaved_records<'a>(
    stored: &[AuditRecord],
    trail: &'a AuditTrail,
) -> Result<&'a [AuditRecord], AuditError> {
    let records = trail.records();
    if stored.len() > records.len() {
        return Err(AuditError::ChainBroken {
            sequence: records.len() as u64 + 1,
            reason: "stored trail is longer than the trail being saved".to_string(),
        });
    }
    if let Some(last) = stored.last() {
        let ours = &records[stored.len() - 1];
        if ours.record_hash != last.record_hash {
            return Err(AuditError::ChainBroken {
                sequence: last.sequence_number,
                reason: "stored record differs from the trail being saved".to_string(),
            });
        }
    }
    Ok(&records[stored.len()..])
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    trails: RwLock<HashMap<String, Vec<AuditRecord>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryAuditStore {
    fn save(&self, trail: &AuditTrail) -> Result<(), AuditError> {
        let mut trails = self.trails.write();
        let stored = trails.entry(trail.run_id().to_string()).or_default();
        let new = unsaved_records(stored, trail)?.to_vec();
        stored.extend(new);
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<AuditTrail, AuditError> {
        self.trails
            .read()
            .get(run_id)
            .map(|records| AuditTrail::from_records(run_id, records.clone()))
            .ok_or_else(|| AuditError::RunNotFound(run_id.to_string()))
    }

    fn run_ids(&self) -> Result<Vec<String>, AuditError> {
        let mut ids: Vec<String> = self.trails.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditActor;

    #[test]
    fn saves_incrementally() {
        let store = MemoryAuditStore::new();
        let mut trail = AuditTrail::new("run");
        trail.append(AuditActor::Matcher, "a", vec![], vec![]);
        store.save(&trail).unwrap();
        trail.append(AuditActor::Mapper, "b", vec![], vec![]);
        store.save(&trail).unwrap();
        store.save(&trail).unwrap();

        let loaded = store.load("run").unwrap();
        assert_eq!(loaded, trail);
        assert!(loaded.verify().valid);
        assert_eq!(store.run_ids().unwrap(), vec!["run".to_string()]);
    }

    #[test]
    fn rejects_divergent_history() {
        let store = MemoryAuditStore::new();
        let mut first = AuditTrail::new("run");
        first.append(AuditActor::Matcher, "a", vec![], vec![]);
        store.save(&first).unwrap();

        let mut other = AuditTrail::new("run");
        other.append(AuditActor::Matcher, "rewritten", vec![], vec![]);
        let err = store.save(&other).unwrap_err();
        assert!(matches!(err, AuditError::ChainBroken { sequence: 1, .. }));
    }

    #[test]
    fn unknown_run_is_not_found() {
        let store = MemoryAuditStore::new();
        assert!(matches!(store.load("nope"), Err(AuditError::RunNotFound(_))));
    }
}
