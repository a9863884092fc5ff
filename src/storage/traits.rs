//! Ledger trait and error types
//!
//! This module defines the trait interface for run ledger backends and
//! associated error types.

use crate::state::BatchStatus;
use crate::storage::{BatchRecord, CategoryRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Batch {ordinal} of run {run_id} not found")]
    BatchNotFound { run_id: i64, ordinal: usize },

    #[error("Invalid batch transition: {from} -> {to}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Trait for run ledger implementations
///
/// The ledger records what a harvest has already done so an interrupted
/// run can pick up after its last checkpointed batch.
pub trait Ledger {
    // ===== Run Management =====

    /// Creates a new run in `Running` state and returns its ID
    fn create_run(&mut self, config_hash: &str) -> LedgerResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> LedgerResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> LedgerResult<Option<RunRecord>>;

    /// Lists every run, newest first
    fn list_runs(&self) -> LedgerResult<Vec<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> LedgerResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> LedgerResult<()>;

    // ===== Categories =====

    /// Records the discovery outcome of one category, replacing an earlier one
    fn record_category(
        &mut self,
        run_id: i64,
        name: &str,
        quota: usize,
        discovered: usize,
    ) -> LedgerResult<()>;

    /// Gets the discovery outcomes of a run, in the order they were recorded
    fn get_categories(&self, run_id: i64) -> LedgerResult<Vec<CategoryRecord>>;

    // ===== Batches =====

    /// Registers a batch as `Pending` unless it is already known
    fn plan_batch(&mut self, run_id: i64, ordinal: usize, url_count: usize) -> LedgerResult<()>;

    /// Moves a batch to `Running`
    fn start_batch(&mut self, run_id: i64, ordinal: usize) -> LedgerResult<()>;

    /// Moves a batch to `Done` and stores its checkpoint details
    fn complete_batch(
        &mut self,
        run_id: i64,
        ordinal: usize,
        record_count: usize,
        failure_count: usize,
        snapshot_path: &str,
    ) -> LedgerResult<()>;

    /// Gets one batch
    fn get_batch(&self, run_id: i64, ordinal: usize) -> LedgerResult<BatchRecord>;

    /// Gets every batch of a run by ordinal
    fn get_batches(&self, run_id: i64) -> LedgerResult<Vec<BatchRecord>>;

    /// Gets the `Done` batches of a run by ordinal
    fn completed_batches(&self, run_id: i64) -> LedgerResult<Vec<BatchRecord>>;
}
