//! Storage module for the run ledger
//!
//! This module persists everything needed to inspect and resume a harvest:
//! - SQLite database initialization and schema management
//! - Run tracking (status, config hash, timestamps)
//! - Per-category discovery outcomes
//! - Per-batch checkpoint state

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteLedger;
pub use traits::{Ledger, LedgerError, LedgerResult};

use crate::state::BatchStatus;
use std::path::Path;

/// Opens or creates the run ledger at `path`
pub fn open_ledger(path: &Path) -> LedgerResult<SqliteLedger> {
    SqliteLedger::new(path)
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    /// A run that never completed can be picked up again
    pub fn is_resumable(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Discovery outcome of one category within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub run_id: i64,
    pub name: String,
    pub quota: usize,
    pub discovered: usize,
    pub completed_at: String,
}

impl CategoryRecord {
    pub fn shortfall(&self) -> usize {
        self.quota.saturating_sub(self.discovered)
    }
}

/// Checkpoint state of one extraction batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub run_id: i64,
    pub ordinal: usize,
    pub url_count: usize,
    pub record_count: usize,
    pub failure_count: usize,
    pub snapshot_path: Option<String>,
    pub status: BatchStatus,
    pub completed_at: Option<String>,
}
