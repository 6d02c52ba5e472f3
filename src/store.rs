//! Case store adapter: append-only history of cases and their fingerprints.
//!
//! No update or delete. Candidate pruning happens in-process; the store only
//! answers get/put/list-all style queries.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use thiserror::Error;

use crate::db::{self, repository, DatabaseError};
use crate::models::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Case {0} not found")]
    NotFound(CaseId),

    #[error("Case {0} already has a fingerprint")]
    AlreadyStored(CaseId),

    #[error("Fingerprint contains non-finite values")]
    NonFiniteFingerprint,

    #[error("Case store unavailable: {0}")]
    Unavailable(#[from] DatabaseError),

    #[error("Case store lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(DatabaseError::Sqlite(e))
    }
}

fn ensure_finite(fingerprint: &Fingerprint) -> Result<(), StoreError> {
    if fingerprint.is_finite() {
        Ok(())
    } else {
        Err(StoreError::NonFiniteFingerprint)
    }
}

/// Narrow persistence interface consumed by the engine.
pub trait CaseStore {
    /// Append a case with its outcome. Ids increase monotonically.
    fn insert_case(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
    ) -> Result<CaseId, StoreError>;

    /// Append a case together with its fingerprint. Either both are stored
    /// or neither is.
    fn append_case(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
        fingerprint: &Fingerprint,
        metadata: &CaseMetadata,
    ) -> Result<CaseId, StoreError>;

    /// Attach the fingerprint and metadata of an inserted case. Once only.
    fn put(
        &self,
        case_id: CaseId,
        fingerprint: &Fingerprint,
        metadata: &CaseMetadata,
    ) -> Result<(), StoreError>;

    /// Every fingerprinted case, in insertion order.
    fn get_all(&self) -> Result<Vec<StoredCase>, StoreError>;

    fn get_by_id(&self, case_id: CaseId) -> Result<StoredCase, StoreError>;

    /// Every case record, fingerprinted or not, in insertion order.
    fn all_cases(&self) -> Result<Vec<CaseRecord>, StoreError>;

    /// Number of case records, fingerprinted or not.
    fn count(&self) -> Result<u64, StoreError>;

    /// Case records at or after `since`, oldest first.
    fn cases_since(&self, since: NaiveDateTime) -> Result<Vec<CaseRecord>, StoreError>;

    /// Newest case records first.
    fn recent(&self, limit: u32) -> Result<Vec<CaseRecord>, StoreError>;

    fn record_lab_results(
        &self,
        case_id: CaseId,
        results: &[LabMeasurement],
    ) -> Result<usize, StoreError>;

    fn lab_results(&self, case_id: CaseId) -> Result<Vec<LabMeasurement>, StoreError>;
}

// ═══════════════════════════════════════════════════════════
// SQLite store
// ═══════════════════════════════════════════════════════════

/// SQLite-backed store. The connection mutex serializes writers, so ids stay
/// monotonic and a scan never observes a half-written case.
pub struct SqliteCaseStore {
    conn: Mutex<Connection>,
}

impl SqliteCaseStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_database(path)?;
        tracing::info!(path = %path.display(), "Case store opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(db::open_memory_database()?),
        })
    }

    /// Flush and release the underlying connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| StoreError::from(e))?;
        tracing::info!("Case store closed");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl CaseStore for SqliteCaseStore {
    fn insert_case(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
    ) -> Result<CaseId, StoreError> {
        let conn = self.lock()?;
        Ok(repository::insert_lab_order(&conn, case, outcome, &recorded_at, session_id)?)
    }

    fn append_case(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
        fingerprint: &Fingerprint,
        metadata: &CaseMetadata,
    ) -> Result<CaseId, StoreError> {
        ensure_finite(fingerprint)?;
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let case_id = repository::insert_lab_order(&tx, case, outcome, &recorded_at, session_id)?;
        repository::insert_case_embedding(&tx, case_id, fingerprint, metadata)?;
        tx.commit()?;
        Ok(case_id)
    }

    fn put(
        &self,
        case_id: CaseId,
        fingerprint: &Fingerprint,
        metadata: &CaseMetadata,
    ) -> Result<(), StoreError> {
        ensure_finite(fingerprint)?;
        let conn = self.lock()?;
        if repository::get_lab_order(&conn, case_id)?.is_none() {
            return Err(StoreError::NotFound(case_id));
        }
        if repository::case_embedding_exists(&conn, case_id)? {
            return Err(StoreError::AlreadyStored(case_id));
        }
        repository::insert_case_embedding(&conn, case_id, fingerprint, metadata)?;
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<StoredCase>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::get_all_case_embeddings(&conn)?)
    }

    fn get_by_id(&self, case_id: CaseId) -> Result<StoredCase, StoreError> {
        let conn = self.lock()?;
        repository::get_case_embedding(&conn, case_id)?.ok_or(StoreError::NotFound(case_id))
    }

    fn all_cases(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::get_all_lab_orders(&conn)?)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        Ok(repository::count_lab_orders(&conn)?)
    }

    fn cases_since(&self, since: NaiveDateTime) -> Result<Vec<CaseRecord>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::get_lab_orders_since(&conn, &since)?)
    }

    fn recent(&self, limit: u32) -> Result<Vec<CaseRecord>, StoreError> {
        let conn = self.lock()?;
        Ok(repository::get_recent_lab_orders(&conn, limit)?)
    }

    fn record_lab_results(
        &self,
        case_id: CaseId,
        results: &[LabMeasurement],
    ) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        if repository::get_lab_order(&conn, case_id)?.is_none() {
            return Err(StoreError::NotFound(case_id));
        }
        Ok(repository::insert_lab_results(&conn, case_id, results)?)
    }

    fn lab_results(&self, case_id: CaseId) -> Result<Vec<LabMeasurement>, StoreError> {
        let conn = self.lock()?;
        if repository::get_lab_order(&conn, case_id)?.is_none() {
            return Err(StoreError::NotFound(case_id));
        }
        Ok(repository::get_lab_results_for_order(&conn, case_id)?)
    }
}

// ═══════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
struct MemoryState {
    records: Vec<CaseRecord>,
    stored: Vec<StoredCase>,
    results: Vec<(CaseId, LabMeasurement)>,
}

impl MemoryState {
    fn record(&self, case_id: CaseId) -> Option<&CaseRecord> {
        self.records.iter().find(|r| r.id == case_id)
    }

    fn push_record(
        &mut self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
    ) -> CaseRecord {
        let record = CaseRecord {
            id: CaseId(self.records.last().map_or(1, |r| r.id.0 + 1)),
            recorded_at,
            session_id: session_id.to_string(),
            case: case.clone(),
            outcome: outcome.clone(),
        };
        self.records.push(record.clone());
        record
    }
}

/// Volatile store with the same semantics as [`SqliteCaseStore`].
#[derive(Default)]
pub struct InMemoryCaseStore {
    state: RwLock<MemoryState>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaseStore for InMemoryCaseStore {
    fn insert_case(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
    ) -> Result<CaseId, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.push_record(case, outcome, recorded_at, session_id).id)
    }

    fn append_case(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
        session_id: &str,
        fingerprint: &Fingerprint,
        metadata: &CaseMetadata,
    ) -> Result<CaseId, StoreError> {
        ensure_finite(fingerprint)?;
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        let record = state.push_record(case, outcome, recorded_at, session_id);
        let case_id = record.id;
        state.stored.push(StoredCase {
            case_id,
            fingerprint: fingerprint.clone(),
            metadata: metadata.clone(),
            record,
        });
        Ok(case_id)
    }

    fn put(
        &self,
        case_id: CaseId,
        fingerprint: &Fingerprint,
        metadata: &CaseMetadata,
    ) -> Result<(), StoreError> {
        ensure_finite(fingerprint)?;
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        let record = state
            .record(case_id)
            .cloned()
            .ok_or(StoreError::NotFound(case_id))?;
        if state.stored.iter().any(|s| s.case_id == case_id) {
            return Err(StoreError::AlreadyStored(case_id));
        }
        state.stored.push(StoredCase {
            case_id,
            fingerprint: fingerprint.clone(),
            metadata: metadata.clone(),
            record,
        });
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<StoredCase>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.stored.clone())
    }

    fn get_by_id(&self, case_id: CaseId) -> Result<StoredCase, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        state
            .stored
            .iter()
            .find(|s| s.case_id == case_id)
            .cloned()
            .ok_or(StoreError::NotFound(case_id))
    }

    fn all_cases(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.records.clone())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.records.len() as u64)
    }

    fn cases_since(&self, since: NaiveDateTime) -> Result<Vec<CaseRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut records: Vec<CaseRecord> = state
            .records
            .iter()
            .filter(|r| r.recorded_at >= since)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.recorded_at, r.id));
        Ok(records)
    }

    fn recent(&self, limit: u32) -> Result<Vec<CaseRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut records = state.records.clone();
        records.sort_by_key(|r| std::cmp::Reverse((r.recorded_at, r.id)));
        records.truncate(limit as usize);
        Ok(records)
    }

    fn record_lab_results(
        &self,
        case_id: CaseId,
        results: &[LabMeasurement],
    ) -> Result<usize, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.record(case_id).is_none() {
            return Err(StoreError::NotFound(case_id));
        }
        state
            .results
            .extend(results.iter().cloned().map(|r| (case_id, r)));
        Ok(results.len())
    }

    fn lab_results(&self, case_id: CaseId) -> Result<Vec<LabMeasurement>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        if state.record(case_id).is_none() {
            return Err(StoreError::NotFound(case_id));
        }
        Ok(state
            .results
            .iter()
            .filter(|(id, _)| *id == case_id)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
