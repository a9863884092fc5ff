//! Output module for harvest results
//!
//! This module handles:
//! - Tabular CSV files for URL lists, batch snapshots and cumulative progress
//! - The final spreadsheet export
//! - Checkpointing and resuming extracted records
//! - Statistics over extracted records and the run ledger

mod checkpoint;
mod spreadsheet;
pub mod stats;
mod tabular;

pub use checkpoint::{BatchCheckpoint, CheckpointStore, FinalExport, HarvestProgress};
pub use spreadsheet::write_spreadsheet;
pub use stats::{load_ledger_summary, print_ledger_summary, print_statistics, HarvestStatistics};
pub use tabular::{
    read_records, read_url_column, write_records, write_url_list, BookRow, UrlRow,
    BOOK_COLUMNS, URL_COLUMN,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Combined URL list written after discovery; the default extraction input
pub const COMBINED_URLS_FILE: &str = "all_book_urls_combined.csv";

/// Final dataset, CSV flavour
pub const FINAL_CSV_FILE: &str = "books_final_dataset.csv";

/// Final dataset, spreadsheet flavour
pub const FINAL_XLSX_FILE: &str = "books_final_dataset.xlsx";

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Column '{column}' missing from {path}")]
    MissingColumn { column: String, path: String },

    #[error("Failed to format output: {0}")]
    Format(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Snapshot file of batch `ordinal`
pub fn batch_file_name(ordinal: usize) -> String {
    format!("books_batch_{}.csv", ordinal)
}

/// Cumulative file holding `size` records
pub fn progress_file_name(size: usize) -> String {
    format!("books_progress_total_{}.csv", size)
}

/// Per-category URL list written after discovery
pub fn category_urls_file_name(category: &str) -> String {
    format!("book_urls_{}.csv", category)
}

/// Writes a file through a sibling temp file and a rename
///
/// Readers never observe a partially written file at `path`.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> OutputResult<()>
where
    F: FnOnce(&Path) -> OutputResult<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp = temp_path(path)?;
    if let Err(e) = write(&temp) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    std::fs::rename(&temp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> OutputResult<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| OutputError::Format(format!("not a file path: {}", path.display())))?;
    Ok(path.with_file_name(format!(".{}.tmp", name)))
}
