// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent job store backed by SQLite, used as a plain transactional
// key-value file: two tables of (key TEXT PRIMARY KEY, value TEXT), values
// are JSON documents serialized by the caller.  The store itself knows
// nothing about job semantics.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use labelproof_core::error::{LabelproofError, Result};
use labelproof_core::types::{JobRecord, JobTimestamp};

/// Convert a `rusqlite::Error` into a `LabelproofError::Store`.
fn db_err(e: rusqlite::Error) -> LabelproofError {
    LabelproofError::Store(e.to_string())
}

/// The logical tables of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableId {
    /// Job status records, keyed by job id.
    Jobs,
    /// Job start timestamps, keyed by start time + job id.
    JobTimes,
}

impl TableId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jobs => "print_jobs",
            Self::JobTimes => "job_times",
        }
    }
}

/// A value the store can persist: declares which table owns it and its
/// primary key within that table.
pub trait Record: Serialize + DeserializeOwned {
    fn table() -> TableId;
    fn key(&self) -> String;
}

impl Record for JobRecord {
    fn table() -> TableId {
        TableId::Jobs
    }

    fn key(&self) -> String {
        self.jobid.to_string()
    }
}

impl Record for JobTimestamp {
    fn table() -> TableId {
        TableId::JobTimes
    }

    // Timestamp-ordered but unique per job, so same-second starts cannot
    // overwrite each other.
    fn key(&self) -> String {
        format!("{}/{}", self.timestamp.to_rfc3339(), self.job_id)
    }
}

/// Schema for the two key-value tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS print_jobs (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS job_times (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Transactional key-value store for job state.
///
/// All methods are synchronous because `rusqlite` does not support async
/// natively; individual statements are atomic, so a failed `put` leaves no
/// partial write visible to readers.  No retries are attempted; callers
/// decide per call site whether a failure is fatal or log-and-continue.
pub struct JobStore {
    conn: Connection,
}

impl JobStore {
    /// Open (or create) the store at the given path.
    ///
    /// Applies WAL journal mode so status polling can read concurrently with
    /// the worker's writes, and creates both tables if missing.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| LabelproofError::Store(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| LabelproofError::Store(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| LabelproofError::Store(format!("create tables: {e}")))?;

        info!("job database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LabelproofError::Store(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| LabelproofError::Store(format!("create tables: {e}")))?;

        debug!("in-memory job database opened");
        Ok(Self { conn })
    }

    /// Persist a record under its own declared table and key, silently
    /// overwriting any existing value.
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let key = record.key();
        let value = serde_json::to_string(record)?;

        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
            R::table().as_str()
        );
        self.conn.execute(&sql, params![key, value]).map_err(db_err)?;

        debug!(table = R::table().as_str(), key = %key, "record stored");
        Ok(())
    }

    /// Fetch and deserialize the record stored under `key`.
    ///
    /// Fails with `NotFound` when the key is absent or the stored value is
    /// empty, and with `Decode` when the stored bytes do not deserialize to
    /// the expected shape.
    pub fn get<R: Record>(&self, key: &str) -> Result<R> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", R::table().as_str());
        let value: Option<String> = self
            .conn
            .query_row(&sql, params![key], |row| row.get(0))
            .optional()
            .map_err(db_err)?;

        match value {
            None => Err(LabelproofError::NotFound(key.to_string())),
            Some(v) if v.is_empty() => Err(LabelproofError::NotFound(key.to_string())),
            Some(v) => serde_json::from_str(&v).map_err(|e| {
                LabelproofError::Decode(format!("{}/{key}: {e}", R::table().as_str()))
            }),
        }
    }

    /// Number of records currently held in a table.
    pub fn count(&self, table: TableId) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        self.conn.query_row(&sql, [], |row| row.get(0)).map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelproof_core::types::{JobId, PrintRequest};

    fn test_record() -> JobRecord {
        JobRecord::new(&PrintRequest::new("^XA^FDtest^FS^XZ", "press@example.com"))
    }

    #[test]
    fn put_then_get_round_trips_all_fields() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        let mut record = test_record();
        record.begin_processing();
        record.finish_success("cGhvdG8=".into(), "dGh1bWI=".into());

        store.put(&record).expect("put");
        let back: JobRecord = store.get(&record.jobid.to_string()).expect("get");
        assert_eq!(back, record);
    }

    #[test]
    fn get_unknown_key_is_not_found() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        let result = store.get::<JobRecord>(&JobId::new().to_string());
        assert!(matches!(result, Err(LabelproofError::NotFound(_))));
    }

    #[test]
    fn put_overwrites_silently() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        let mut record = test_record();
        store.put(&record).expect("first put");

        record.begin_processing();
        store.put(&record).expect("second put");

        let back: JobRecord = store.get(&record.jobid.to_string()).expect("get");
        assert_eq!(back.status, record.status);
        assert_eq!(back.log, record.log);
    }

    #[test]
    fn empty_stored_value_is_not_found() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        store
            .conn
            .execute(
                "INSERT INTO print_jobs (key, value) VALUES (?1, ?2)",
                params!["hollow", ""],
            )
            .expect("insert raw row");

        let result = store.get::<JobRecord>("hollow");
        assert!(matches!(result, Err(LabelproofError::NotFound(_))));
    }

    #[test]
    fn malformed_stored_value_is_decode_error() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        store
            .conn
            .execute(
                "INSERT INTO print_jobs (key, value) VALUES (?1, ?2)",
                params!["mangled", "{\"not\": \"a job record\"}"],
            )
            .expect("insert raw row");

        let result = store.get::<JobRecord>("mangled");
        assert!(matches!(result, Err(LabelproofError::Decode(_))));
    }

    #[test]
    fn tables_are_independent() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        let record = test_record();
        let stamp = JobTimestamp::started(record.jobid);

        store.put(&record).expect("put job");
        store.put(&stamp).expect("put timestamp");

        // The audit key never resolves in the jobs table.
        let missed = store.get::<JobRecord>(&stamp.key());
        assert!(matches!(missed, Err(LabelproofError::NotFound(_))));

        let back: JobTimestamp = store.get(&stamp.key()).expect("get timestamp");
        assert_eq!(back, stamp);
    }

    #[test]
    fn same_second_timestamps_keep_both_entries() {
        let store = JobStore::open_in_memory().expect("open in-memory store");
        let first = JobTimestamp::started(JobId::new());
        let second = JobTimestamp {
            timestamp: first.timestamp,
            job_id: JobId::new(),
        };

        store.put(&first).expect("put first");
        store.put(&second).expect("put second");

        let a: JobTimestamp = store.get(&first.key()).expect("get first");
        let b: JobTimestamp = store.get(&second.key()).expect("get second");
        assert_eq!(a.job_id, first.job_id);
        assert_eq!(b.job_id, second.job_id);
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs.db");
        let record = test_record();

        {
            let store = JobStore::open(&path).expect("open");
            store.put(&record).expect("put");
        }

        let store = JobStore::open(&path).expect("reopen");
        let back: JobRecord = store.get(&record.jobid.to_string()).expect("get");
        assert_eq!(back, record);
    }
}
