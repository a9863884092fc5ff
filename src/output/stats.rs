//! Statistics over extracted records and the run ledger
//!
//! This module provides functionality for summarizing a harvest, either
//! from the records themselves or from what the ledger recorded.

use crate::extract::BookRecord;
use crate::state::BatchStatus;
use crate::storage::{BatchRecord, CategoryRecord, Ledger, RunRecord};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestStatistics {
    /// Number of extracted records
    pub records: usize,

    /// Records carrying a rating
    pub with_rating: usize,

    /// Share of records carrying a rating, in percent
    pub rating_rate: f64,

    /// Mean rating over records carrying one
    pub avg_rating: Option<f64>,

    /// Records carrying a rating count
    pub with_rating_count: usize,

    /// Records carrying a description
    pub with_description: usize,

    /// Mean description length in characters, absent descriptions counting as zero
    pub avg_description_len: f64,

    /// Records carrying at least one genre
    pub with_genres: usize,
}

impl HarvestStatistics {
    /// Computes statistics over `records`
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_harvest::output::HarvestStatistics;
    ///
    /// let stats = HarvestStatistics::from_records(&[]);
    /// assert_eq!(stats.records, 0);
    /// assert_eq!(stats.avg_rating, None);
    /// ```
    pub fn from_records(records: &[BookRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let total = records.len();
        let ratings: Vec<f64> = records.iter().filter_map(|r| r.rating).collect();
        let description_chars: usize = records.iter().map(BookRecord::description_len).sum();

        Self {
            records: total,
            with_rating: ratings.len(),
            rating_rate: ratings.len() as f64 / total as f64 * 100.0,
            avg_rating: (!ratings.is_empty())
                .then(|| ratings.iter().sum::<f64>() / ratings.len() as f64),
            with_rating_count: records.iter().filter(|r| r.rating_count.is_some()).count(),
            with_description: records.iter().filter(|r| r.description.is_some()).count(),
            avg_description_len: description_chars as f64 / total as f64,
            with_genres: records.iter().filter(|r| !r.genres.is_empty()).count(),
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records extracted: {}", stats.records);
    println!(
        "  With rating: {} ({:.1}%)",
        stats.with_rating, stats.rating_rate
    );
    if let Some(avg) = stats.avg_rating {
        println!("  Average rating: {:.2}", avg);
    }
    println!("  With rating count: {}", stats.with_rating_count);
    println!("  With description: {}", stats.with_description);
    println!(
        "  Average description length: {:.0} chars",
        stats.avg_description_len
    );
    println!("  With genres: {}", stats.with_genres);
}

/// What the ledger knows about past harvests
#[derive(Debug, Clone)]
pub struct LedgerSummary {
    /// All runs, newest first
    pub runs: Vec<RunRecord>,

    /// Discovery outcomes of the newest run
    pub categories: Vec<CategoryRecord>,

    /// Batches of the newest run
    pub batches: Vec<BatchRecord>,
}

impl LedgerSummary {
    pub fn latest_run(&self) -> Option<&RunRecord> {
        self.runs.first()
    }

    /// Categories of the newest run that fell short of their quota
    pub fn shortfalls(&self) -> Vec<&CategoryRecord> {
        self.categories.iter().filter(|c| c.shortfall() > 0).collect()
    }

    pub fn records_checkpointed(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.status == BatchStatus::Done)
            .map(|b| b.record_count)
            .sum()
    }
}

/// Loads a summary of the newest run from the ledger
pub fn load_ledger_summary(ledger: &dyn Ledger) -> Result<LedgerSummary, HarvestError> {
    let runs = ledger.list_runs()?;

    let (categories, batches) = match runs.first() {
        Some(run) => (ledger.get_categories(run.id)?, ledger.get_batches(run.id)?),
        None => (Vec::new(), Vec::new()),
    };

    Ok(LedgerSummary {
        runs,
        categories,
        batches,
    })
}

/// Prints a ledger summary to stdout
pub fn print_ledger_summary(summary: &LedgerSummary) {
    println!("=== Harvest Ledger ===\n");

    let Some(latest) = summary.latest_run() else {
        println!("No harvest runs recorded.");
        return;
    };

    println!("Runs recorded: {}", summary.runs.len());
    println!("Latest run: #{}", latest.id);
    println!("  Status: {}", latest.status.to_db_string());
    println!("  Started: {}", latest.started_at);
    if let Some(finished) = &latest.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", latest.config_hash);
    println!();

    if !summary.categories.is_empty() {
        println!("Categories:");
        for category in &summary.categories {
            let status = if category.shortfall() == 0 {
                "quota met".to_string()
            } else {
                format!("short by {}", category.shortfall())
            };
            println!(
                "  {:24} {:>5}/{:<5} {}",
                category.name, category.discovered, category.quota, status
            );
        }
        println!();
    }

    let shortfalls = summary.shortfalls();
    if !shortfalls.is_empty() {
        println!("Categories below quota: {}", shortfalls.len());
        println!();
    }

    if !summary.batches.is_empty() {
        println!("Batches:");
        for batch in &summary.batches {
            println!(
                "  #{:<4} {:8} {:>5} URLs {:>5} records {:>5} failures",
                batch.ordinal,
                batch.status.to_db_string(),
                batch.url_count,
                batch.record_count,
                batch.failure_count
            );
        }
        println!();
    }

    println!(
        "Records checkpointed: {}",
        summary.records_checkpointed()
    );
}
