//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Every document lives in one `documents` table as JSON text, tagged with
//! the name of its collection.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, RunTotals};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, \
                           page_errors, article_errors, records_written";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, page_errors = ?3,
             article_errors = ?4, records_written = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                totals.page_errors as i64,
                totals.article_errors as i64,
                totals.records_written as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        totals: RunTotals {
            page_errors: row.get::<_, i64>(5)? as u64,
            article_errors: row.get::<_, i64>(6)? as u64,
            records_written: row.get::<_, i64>(7)? as u64,
        },
    })
}

impl Storage for SqliteStorage {
    // ===== Collections =====

    fn count(&self, collection: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn insert_many(&mut self, collection: &str, documents: &[Value]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (collection, body, inserted_at) VALUES (?1, ?2, ?3)",
            )?;
            for document in documents {
                let body = serde_json::to_string(document)?;
                stmt.execute(params![collection, body, now])?;
            }
        }
        tx.commit()?;
        Ok(documents.len())
    }

    fn find_all(&self, collection: &str) -> StorageResult<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id ASC")?;

        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let documents = bodies
            .iter()
            .map(|body| serde_json::from_str(body))
            .collect::<Result<Vec<Value>, _>>()?;

        Ok(documents)
    }

    fn collection_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, totals: &RunTotals) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Completed, totals)
    }

    fn fail_run(&mut self, run_id: i64, totals: &RunTotals) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Failed, totals)
    }
}
