//! SQLite ledger implementation
//!
//! This module provides a SQLite-based implementation of the Ledger trait.

use crate::state::BatchStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Ledger, LedgerError, LedgerResult};
use crate::storage::{BatchRecord, CategoryRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status";

const BATCH_COLUMNS: &str = "run_id, ordinal, url_count, record_count, failure_count, \
                             snapshot_path, status, completed_at";

/// SQLite run ledger
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens or creates the ledger database at `path`
    pub fn new(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn batch_status(&self, run_id: i64, ordinal: usize) -> LedgerResult<BatchStatus> {
        self.get_batch(run_id, ordinal).map(|batch| batch.status)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<BatchRecord> {
    Ok(BatchRecord {
        run_id: row.get(0)?,
        ordinal: row.get::<_, i64>(1)? as usize,
        url_count: row.get::<_, i64>(2)? as usize,
        record_count: row.get::<_, i64>(3)? as usize,
        failure_count: row.get::<_, i64>(4)? as usize,
        snapshot_path: row.get(5)?,
        status: BatchStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(BatchStatus::Pending),
        completed_at: row.get(7)?,
    })
}

impl Ledger for SqliteLedger {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> LedgerResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> LedgerResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(LedgerError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> LedgerResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn list_runs(&self) -> LedgerResult<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM runs ORDER BY id DESC", RUN_COLUMNS))?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> LedgerResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Categories =====

    fn record_category(
        &mut self,
        run_id: i64,
        name: &str,
        quota: usize,
        discovered: usize,
    ) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO categories (run_id, name, quota, discovered, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(run_id, name) DO UPDATE SET
                quota = excluded.quota,
                discovered = excluded.discovered,
                completed_at = excluded.completed_at",
            params![run_id, name, quota as i64, discovered as i64, now],
        )?;
        Ok(())
    }

    fn get_categories(&self, run_id: i64) -> LedgerResult<Vec<CategoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, name, quota, discovered, completed_at
             FROM categories WHERE run_id = ?1 ORDER BY id",
        )?;

        let categories = stmt
            .query_map(params![run_id], |row| {
                Ok(CategoryRecord {
                    run_id: row.get(0)?,
                    name: row.get(1)?,
                    quota: row.get::<_, i64>(2)? as usize,
                    discovered: row.get::<_, i64>(3)? as usize,
                    completed_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    // ===== Batches =====

    fn plan_batch(&mut self, run_id: i64, ordinal: usize, url_count: usize) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO batches (run_id, ordinal, url_count, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                ordinal as i64,
                url_count as i64,
                BatchStatus::Pending.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn start_batch(&mut self, run_id: i64, ordinal: usize) -> LedgerResult<()> {
        let current = self.batch_status(run_id, ordinal)?;
        if current.is_terminal() {
            return Err(LedgerError::InvalidTransition {
                from: current,
                to: BatchStatus::Running,
            });
        }

        self.conn.execute(
            "UPDATE batches SET status = ?1 WHERE run_id = ?2 AND ordinal = ?3",
            params![BatchStatus::Running.to_db_string(), run_id, ordinal as i64],
        )?;
        Ok(())
    }

    fn complete_batch(
        &mut self,
        run_id: i64,
        ordinal: usize,
        record_count: usize,
        failure_count: usize,
        snapshot_path: &str,
    ) -> LedgerResult<()> {
        let current = self.batch_status(run_id, ordinal)?;
        if current != BatchStatus::Running {
            return Err(LedgerError::InvalidTransition {
                from: current,
                to: BatchStatus::Done,
            });
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE batches
             SET status = ?1, record_count = ?2, failure_count = ?3,
                 snapshot_path = ?4, completed_at = ?5
             WHERE run_id = ?6 AND ordinal = ?7",
            params![
                BatchStatus::Done.to_db_string(),
                record_count as i64,
                failure_count as i64,
                snapshot_path,
                now,
                run_id,
                ordinal as i64
            ],
        )?;
        Ok(())
    }

    fn get_batch(&self, run_id: i64, ordinal: usize) -> LedgerResult<BatchRecord> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM batches WHERE run_id = ?1 AND ordinal = ?2",
                    BATCH_COLUMNS
                ),
                params![run_id, ordinal as i64],
                batch_from_row,
            )
            .optional()?
            .ok_or(LedgerError::BatchNotFound { run_id, ordinal })
    }

    fn get_batches(&self, run_id: i64) -> LedgerResult<Vec<BatchRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM batches WHERE run_id = ?1 ORDER BY ordinal",
            BATCH_COLUMNS
        ))?;
        let batches = stmt
            .query_map(params![run_id], batch_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    fn completed_batches(&self, run_id: i64) -> LedgerResult<Vec<BatchRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM batches WHERE run_id = ?1 AND status = ?2 ORDER BY ordinal",
            BATCH_COLUMNS
        ))?;
        let batches = stmt
            .query_map(
                params![run_id, BatchStatus::Done.to_db_string()],
                batch_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }
}
