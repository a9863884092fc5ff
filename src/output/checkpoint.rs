//! Batch checkpointing and final export
//!
//! After every batch the store writes:
//! - an immutable snapshot of that batch (`books_batch_<n>.csv`)
//! - the cumulative record set so far (`books_progress_total_<size>.csv`)
//!
//! At the end of a harvest the cumulative set becomes the final dataset in
//! CSV and spreadsheet form. A store can be rebuilt from the snapshots of
//! batches that were already checkpointed.

use crate::extract::BookRecord;
use crate::output::stats::HarvestStatistics;
use crate::output::{
    batch_file_name, progress_file_name, read_records, write_records, write_spreadsheet,
    OutputResult, FINAL_CSV_FILE, FINAL_XLSX_FILE,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Records extracted so far, in merge order
#[derive(Debug, Clone, Default)]
pub struct HarvestProgress {
    records: Vec<BookRecord>,
    batch_counts: BTreeMap<usize, usize>,
}

impl HarvestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch's records unless that batch was merged before
    ///
    /// Returns false if `ordinal` was already merged.
    pub fn merge_batch(&mut self, ordinal: usize, records: &[BookRecord]) -> bool {
        if self.batch_counts.contains_key(&ordinal) {
            return false;
        }
        self.records.extend_from_slice(records);
        self.batch_counts.insert(ordinal, records.len());
        true
    }

    pub fn records(&self) -> &[BookRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record count per merged batch ordinal
    pub fn batch_counts(&self) -> &BTreeMap<usize, usize> {
        &self.batch_counts
    }

    pub fn contains_batch(&self, ordinal: usize) -> bool {
        self.batch_counts.contains_key(&ordinal)
    }
}

/// Files written for one checkpointed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCheckpoint {
    pub ordinal: usize,
    pub snapshot: PathBuf,
    pub cumulative: PathBuf,
    pub cumulative_size: usize,
}

/// Files written at the end of a harvest
#[derive(Debug, Clone)]
pub struct FinalExport {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
    pub statistics: HarvestStatistics,
}

/// Owns the output directory and the cumulative progress of a harvest
#[derive(Debug)]
pub struct CheckpointStore {
    directory: PathBuf,
    progress: HarvestProgress,
}

impl CheckpointStore {
    /// Creates a store writing into `directory`, creating it if needed
    pub fn new(directory: impl Into<PathBuf>) -> OutputResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            progress: HarvestProgress::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn progress(&self) -> &HarvestProgress {
        &self.progress
    }

    pub fn batch_path(&self, ordinal: usize) -> PathBuf {
        self.directory.join(batch_file_name(ordinal))
    }

    pub fn progress_path(&self, size: usize) -> PathBuf {
        self.directory.join(progress_file_name(size))
    }

    /// Persists a batch snapshot, merges it and rewrites the cumulative file
    ///
    /// Checkpointing an ordinal a second time changes nothing and returns
    /// the files of the first checkpoint.
    pub fn checkpoint_batch(
        &mut self,
        ordinal: usize,
        records: &[BookRecord],
    ) -> OutputResult<BatchCheckpoint> {
        let snapshot = self.batch_path(ordinal);

        if self.progress.contains_batch(ordinal) {
            tracing::warn!("Batch {} was already checkpointed, ignoring", ordinal);
            let size = self.progress.len();
            return Ok(BatchCheckpoint {
                ordinal,
                snapshot,
                cumulative: self.progress_path(size),
                cumulative_size: size,
            });
        }

        write_records(&snapshot, records)?;
        self.progress.merge_batch(ordinal, records);

        let size = self.progress.len();
        let cumulative = self.progress_path(size);
        write_records(&cumulative, self.progress.records())?;

        tracing::info!(
            "Checkpointed batch {}: {} records ({} total) in {}",
            ordinal,
            records.len(),
            size,
            snapshot.display()
        );

        Ok(BatchCheckpoint {
            ordinal,
            snapshot,
            cumulative,
            cumulative_size: size,
        })
    }

    /// Reloads already checkpointed batches from their snapshots, in the given order
    ///
    /// Returns the number of records restored.
    pub fn resume<I>(&mut self, snapshots: I) -> OutputResult<usize>
    where
        I: IntoIterator<Item = (usize, PathBuf)>,
    {
        let mut restored = 0;

        for (ordinal, path) in snapshots {
            let records = read_records(&path)?;
            if self.progress.merge_batch(ordinal, &records) {
                tracing::info!(
                    "Restored batch {} ({} records) from {}",
                    ordinal,
                    records.len(),
                    path.display()
                );
                restored += records.len();
            }
        }

        Ok(restored)
    }

    /// Writes the final dataset and returns its statistics
    pub fn finalize(&self) -> OutputResult<FinalExport> {
        let csv = self.directory.join(FINAL_CSV_FILE);
        let xlsx = self.directory.join(FINAL_XLSX_FILE);
        let records = self.progress.records();

        write_records(&csv, records)?;
        write_spreadsheet(&xlsx, records)?;

        let statistics = HarvestStatistics::from_records(records);
        tracing::info!(
            "Final dataset: {} records written to {} and {}",
            records.len(),
            csv.display(),
            xlsx.display()
        );

        Ok(FinalExport {
            csv,
            xlsx,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records(prefix: &str, n: usize) -> Vec<BookRecord> {
        (0..n)
            .map(|i| BookRecord {
                title: format!("{} {}", prefix, i),
                author: "Author".to_string(),
                rating: Some(3.5),
                rating_count: Some(10),
                description: Some("x".repeat(120)),
                genres: vec!["Fiction".to_string()],
            })
            .collect()
    }

    #[test]
    fn test_merge_is_idempotent_per_ordinal() {
        let mut progress = HarvestProgress::new();
        assert!(progress.merge_batch(1, &records("a", 3)));
        assert!(!progress.merge_batch(1, &records("a", 3)));
        assert!(progress.merge_batch(2, &records("b", 2)));

        assert_eq!(progress.len(), 5);
        assert_eq!(progress.batch_counts().get(&1), Some(&3));
        assert_eq!(progress.batch_counts().get(&2), Some(&2));
    }

    #[test]
    fn test_checkpoint_writes_snapshot_and_cumulative() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::new(dir.path()).unwrap();

        let first = store.checkpoint_batch(1, &records("a", 8)).unwrap();
        assert_eq!(first.cumulative_size, 8);
        assert!(dir.path().join("books_batch_1.csv").exists());
        assert!(dir.path().join("books_progress_total_8.csv").exists());

        let second = store.checkpoint_batch(2, &records("b", 4)).unwrap();
        assert_eq!(second.cumulative_size, 12);
        assert_eq!(read_records(&second.snapshot).unwrap().len(), 4);
        assert_eq!(read_records(&second.cumulative).unwrap().len(), 12);
    }

    #[test]
    fn test_checkpoint_same_ordinal_twice() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::new(dir.path()).unwrap();

        store.checkpoint_batch(1, &records("a", 2)).unwrap();
        let again = store.checkpoint_batch(1, &records("z", 5)).unwrap();

        assert_eq!(again.cumulative_size, 2);
        let snapshot = read_records(&store.batch_path(1)).unwrap();
        assert_eq!(snapshot[0].title, "a 0");
    }

    #[test]
    fn test_resume_matches_uninterrupted_store() {
        let dir = TempDir::new().unwrap();
        let batch1 = records("a", 3);
        let batch2 = records("b", 2);

        let mut uninterrupted = CheckpointStore::new(dir.path().join("full")).unwrap();
        uninterrupted.checkpoint_batch(1, &batch1).unwrap();
        uninterrupted.checkpoint_batch(2, &batch2).unwrap();

        let mut first_attempt = CheckpointStore::new(dir.path().join("resumed")).unwrap();
        let checkpoint = first_attempt.checkpoint_batch(1, &batch1).unwrap();
        drop(first_attempt);

        let mut resumed = CheckpointStore::new(dir.path().join("resumed")).unwrap();
        let restored = resumed.resume(vec![(1, checkpoint.snapshot)]).unwrap();
        assert_eq!(restored, 3);
        resumed.checkpoint_batch(2, &batch2).unwrap();

        assert_eq!(resumed.progress().records(), uninterrupted.progress().records());
    }

    #[test]
    fn test_finalize_writes_both_formats() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::new(dir.path()).unwrap();
        store.checkpoint_batch(1, &records("a", 4)).unwrap();

        let export = store.finalize().unwrap();

        assert!(export.csv.ends_with(FINAL_CSV_FILE));
        assert!(export.xlsx.exists());
        assert_eq!(read_records(&export.csv).unwrap().len(), 4);
        assert_eq!(export.statistics.records, 4);
        assert_eq!(export.statistics.avg_description_len, 120.0);
    }
}
