//! SQLite WAL persistence for audit trails
//!
//! - WAL mode: readers never block the single writer
//! - Append-only: triggers abort any UPDATE or DELETE on stored records
//! - Integrity: every loaded trail is re-verified before it is returned

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

use super::store::{unsaved_records, AuditStore};
use super::{AuditActor, AuditRecord, AuditTrail};
use crate::error::AuditError;
use crate::types::Blake3Hash;

pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AuditError::Storage(format!("creating '{}': {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::with_connection(conn)
    }

    /// Store backed by a private in-memory database
    pub fn open_in_memory() -> Result<Self, AuditError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AuditError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn migrate(conn: &Connection) -> Result<(), AuditError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS audit_records (
            run_id          TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            actor           TEXT NOT NULL,
            action          TEXT NOT NULL,
            input_refs      TEXT NOT NULL,
            output_refs     TEXT NOT NULL,
            timestamp       TEXT NOT NULL,
            prior_hash      TEXT NOT NULL,
            record_hash     TEXT NOT NULL,
            PRIMARY KEY (run_id, sequence_number)
        );

        CREATE TRIGGER IF NOT EXISTS audit_records_no_update
            BEFORE UPDATE ON audit_records
            BEGIN SELECT RAISE(ABORT, 'audit records are append-only'); END;

        CREATE TRIGGER IF NOT EXISTS audit_records_no_delete
            BEFORE DELETE ON audit_records
            BEGIN SELECT RAISE(ABORT, 'audit records are append-only'); END;
        ",
    )?;
    Ok(())
}

/// Raw column values, decoded after the statement is finished
struct Row {
    sequence_number: i64,
    actor: String,
    action: String,
    input_refs: String,
    output_refs: String,
    timestamp: String,
    prior_hash: String,
    record_hash: String,
}

impl Row {
    fn decode(self) -> Result<AuditRecord, AuditError> {
        let bad = |what: &str, detail: String| {
            AuditError::Storage(format!(
                "record {}: invalid {}: {}",
                self.sequence_number, what, detail
            ))
        };

        Ok(AuditRecord {
            sequence_number: self.sequence_number as u64,
            actor: AuditActor::parse(&self.actor)
                .ok_or_else(|| bad("actor", self.actor.clone()))?,
            action: self.action.clone(),
            input_refs: serde_json::from_str(&self.input_refs)
                .map_err(|e| bad("input_refs", e.to_string()))?,
            output_refs: serde_json::from_str(&self.output_refs)
                .map_err(|e| bad("output_refs", e.to_string()))?,
            timestamp: DateTime::parse_from_rfc3339(&self.timestamp)
                .map_err(|e| bad("timestamp", e.to_string()))?
                .with_timezone(&Utc),
            prior_hash: Blake3Hash::from_hex(&self.prior_hash)
                .map_err(|e| bad("prior_hash", e.to_string()))?,
            record_hash: Blake3Hash::from_hex(&self.record_hash)
                .map_err(|e| bad("record_hash", e.to_string()))?,
        })
    }
}

fn load_records(conn: &Connection, run_id: &str) -> Result<Vec<AuditRecord>, AuditError> {
    let mut stmt = conn.prepare(
        "SELECT sequence_number, actor, action, input_refs, output_refs,
                timestamp, prior_hash, record_hash
         FROM audit_records WHERE run_id = ?1 ORDER BY sequence_number ASC",
    )?;
    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok(Row {
                sequence_number: row.get(0)?,
                actor: row.get(1)?,
                action: row.get(2)?,
                input_refs: row.get(3)?,
                output_refs: row.get(4)?,
                timestamp: row.get(5)?,
                prior_hash: row.get(6)?,
                record_hash: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(Row::decode).collect()
}

fn json_refs(refs: &[String]) -> Result<String, AuditError> {
    serde_json::to_string(refs).map_err(|e| AuditError::Storage(e.to_string()))
}

impl AuditStore for SqliteAuditStore {
    fn save(&self, trail: &AuditTrail) -> Result<(), AuditError> {
        let mut conn = self.conn.lock();
        let stored = load_records(&conn, trail.run_id())?;
        let new = unsaved_records(&stored, trail)?;
        if new.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO audit_records
                    (run_id, sequence_number, actor, action, input_refs, output_refs,
                     timestamp, prior_hash, record_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in new {
                stmt.execute(params![
                    trail.run_id(),
                    record.sequence_number as i64,
                    record.actor.as_str(),
                    record.action,
                    json_refs(&record.input_refs)?,
                    json_refs(&record.output_refs)?,
                    record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    record.prior_hash.to_hex(),
                    record.record_hash.to_hex(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(run_id = trail.run_id(), appended = new.len(), "audit records persisted");
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<AuditTrail, AuditError> {
        let records = load_records(&self.conn.lock(), run_id)?;
        if records.is_empty() {
            return Err(AuditError::RunNotFound(run_id.to_string()));
        }

        let trail = AuditTrail::from_records(run_id, records);
        let verification = trail.verify();
        if let Some(issue) = verification.issues.first() {
            return Err(AuditError::ChainBroken {
                sequence: issue.sequence(),
                reason: issue.to_string(),
            });
        }
        Ok(trail)
    }

    fn run_ids(&self) -> Result<Vec<String>, AuditError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT run_id FROM audit_records ORDER BY run_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail(run_id: &str) -> AuditTrail {
        let mut trail = AuditTrail::new(run_id);
        trail.append(
            AuditActor::Matcher,
            "matched",
            vec!["ev-1".into()],
            vec!["3.3.1".into()],
        );
        trail.append(AuditActor::Verifier, "verified", vec![], vec!["3.3.1".into()]);
        trail
    }

    #[test]
    fn round_trips_and_verifies() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let trail = trail("run-a");
        store.save(&trail).unwrap();

        let loaded = store.load("run-a").unwrap();
        assert_eq!(loaded, trail);
        assert_eq!(store.run_ids().unwrap(), vec!["run-a".to_string()]);
    }

    #[test]
    fn updates_are_refused() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.save(&trail("run-a")).unwrap();

        let conn = store.conn.lock();
        let result = conn.execute(
            "UPDATE audit_records SET action = 'forged' WHERE sequence_number = 1",
            [],
        );
        assert!(result.is_err());
        let result = conn.execute("DELETE FROM audit_records", []);
        assert!(result.is_err());
    }

    #[test]
    fn missing_run_is_not_found() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        assert!(matches!(store.load("none"), Err(AuditError::RunNotFound(_))));
    }
}
