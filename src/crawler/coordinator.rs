//! Harvest coordinator - main harvest orchestration logic
//!
//! This module ties the pipeline together for one run:
//! - Creating or resuming a run in the ledger
//! - Discovering item URLs for every configured category
//! - Writing per-category and combined URL lists
//! - Extracting records batch by batch with checkpointing
//! - Writing the final dataset

use crate::config::Config;
use crate::crawler::fetcher::{HttpSessionFactory, SessionFactory};
use crate::crawler::frontier::{CategoryTarget, DiscoveryReport, Frontier};
use crate::crawler::scheduler::plan_batches;
use crate::crawler::worker::{run_batch, WorkerSettings};
use crate::output::{
    category_urls_file_name, read_url_column, write_url_list, CheckpointStore, FinalExport,
    HarvestStatistics, UrlRow, COMBINED_URLS_FILE, URL_COLUMN,
};
use crate::storage::{Ledger, RunStatus, SqliteLedger};
use crate::HarvestError;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which stages of the pipeline a run executes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HarvestMode {
    /// Discovery for every category, then extraction of the combined list
    #[default]
    Full,

    /// Stop once the URL lists are written
    DiscoverOnly,

    /// Skip discovery and extract from an existing URL list
    ExtractOnly,
}

/// Options for one harvest invocation
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    pub mode: HarvestMode,

    /// Start a new run even if an unfinished one exists
    pub fresh: bool,

    /// URL list for [`HarvestMode::ExtractOnly`]; defaults to the combined list
    pub input: Option<PathBuf>,
}

/// Counters over the batches processed by one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub batches_run: usize,
    /// Batches already checkpointed by an earlier attempt of the run
    pub batches_skipped: usize,
    pub records: usize,
    pub failures: usize,
    pub incomplete: usize,
    pub fatal_workers: usize,
}

/// What a harvest run did
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub run_id: i64,
    pub resumed: bool,
    /// Reports of the categories discovered in this invocation
    pub discovery: Vec<DiscoveryReport>,
    pub url_count: usize,
    pub extraction: Option<ExtractionReport>,
    pub export: Option<FinalExport>,
}

/// Main harvest coordinator structure
pub struct Harvester {
    config: Config,
    ledger: SqliteLedger,
    factory: Arc<dyn SessionFactory>,
    store: CheckpointStore,
    run_id: i64,
    resumed: bool,
}

impl Harvester {
    /// Opens the ledger and output directory and creates or resumes a run
    ///
    /// Unless `fresh` is set, the latest run is resumed if it never completed.
    /// With `fresh`, an unfinished latest run is marked interrupted and a new
    /// run is started.
    pub fn new(
        config: Config,
        config_hash: &str,
        fresh: bool,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self, HarvestError> {
        let mut ledger = SqliteLedger::new(Path::new(&config.output.database_path))?;

        let (run_id, resumed) = match ledger.get_latest_run()? {
            Some(run) if run.status.is_resumable() && !fresh => {
                if run.config_hash != config_hash {
                    tracing::warn!(
                        "Configuration changed since run {} was started",
                        run.id
                    );
                }
                tracing::info!(
                    "Resuming {} run {} started at {}",
                    run.status.to_db_string(),
                    run.id,
                    run.started_at
                );
                ledger.update_run_status(run.id, RunStatus::Running)?;
                (run.id, true)
            }
            Some(run) if run.status == RunStatus::Running => {
                tracing::info!("Abandoning unfinished run {}", run.id);
                ledger.update_run_status(run.id, RunStatus::Interrupted)?;
                (ledger.create_run(config_hash)?, false)
            }
            _ => {
                let run_id = ledger.create_run(config_hash)?;
                tracing::info!("Starting new run {}", run_id);
                (run_id, false)
            }
        };

        let store = CheckpointStore::new(config.output.directory.clone())?;

        Ok(Self {
            config,
            ledger,
            factory,
            store,
            run_id,
            resumed,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn ledger(&self) -> &SqliteLedger {
        &self.ledger
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Runs the stages selected by `options`
    ///
    /// A run that fails is marked as such in the ledger; it stays resumable.
    pub async fn run(&mut self, options: &HarvestOptions) -> Result<HarvestSummary, HarvestError> {
        match self.execute(options).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::error!("Harvest run {} failed: {}", self.run_id, e);
                if let Err(ledger_error) =
                    self.ledger.update_run_status(self.run_id, RunStatus::Failed)
                {
                    tracing::warn!("Could not mark run {} failed: {}", self.run_id, ledger_error);
                }
                Err(e)
            }
        }
    }

    async fn execute(&mut self, options: &HarvestOptions) -> Result<HarvestSummary, HarvestError> {
        let mut summary = HarvestSummary {
            run_id: self.run_id,
            resumed: self.resumed,
            discovery: Vec::new(),
            url_count: 0,
            extraction: None,
            export: None,
        };

        let urls = match options.mode {
            HarvestMode::ExtractOnly => {
                let input = options
                    .input
                    .clone()
                    .unwrap_or_else(|| self.store.directory().join(COMBINED_URLS_FILE));
                let urls = load_url_input(&input)?;
                tracing::info!("Loaded {} URLs from {}", urls.len(), input.display());
                urls
            }
            HarvestMode::Full | HarvestMode::DiscoverOnly => {
                let (reports, urls) = self.discover_all().await?;
                summary.discovery = reports;
                urls
            }
        };
        summary.url_count = urls.len();

        if options.mode == HarvestMode::DiscoverOnly {
            self.ledger.complete_run(self.run_id)?;
            return Ok(summary);
        }

        summary.extraction = Some(self.extract(&urls).await?);
        summary.export = Some(self.finish()?);

        Ok(summary)
    }

    /// Discovers item URLs for every configured category
    ///
    /// Each category gets a session of its own. A category that cannot be
    /// set up is logged and skipped. On a resumed run, categories recorded
    /// in the ledger are read back from their URL files instead of being
    /// discovered again.
    ///
    /// Returns the reports of the categories discovered now and the
    /// combined, deduplicated URL list.
    pub async fn discover_all(
        &mut self,
    ) -> Result<(Vec<DiscoveryReport>, Vec<String>), HarvestError> {
        let frontier = Frontier::new(&self.config)?;
        let recorded: HashSet<String> = if self.resumed {
            self.ledger
                .get_categories(self.run_id)?
                .into_iter()
                .map(|c| c.name)
                .collect()
        } else {
            HashSet::new()
        };

        let entries = self.config.categories.clone();
        let default_quota = self.config.harvest.quota;
        let mut reports = Vec::new();
        let mut per_category: Vec<(String, Vec<String>)> = Vec::new();
        let mut visited_any = false;

        tracing::info!("Discovering {} categories", entries.len());

        for entry in &entries {
            let mut target = match CategoryTarget::from_entry(entry, default_quota) {
                Ok(target) => target,
                Err(e) => {
                    tracing::error!("Skipping category {}: {}", entry.url, e);
                    continue;
                }
            };
            let url_file = self
                .store
                .directory()
                .join(category_urls_file_name(&target.name));

            if recorded.contains(&target.name) && url_file.exists() {
                match read_url_column(&url_file, URL_COLUMN) {
                    Ok(urls) => {
                        tracing::info!(
                            "{}: reusing {} URLs discovered earlier in this run",
                            target.name,
                            urls.len()
                        );
                        per_category.push((target.name, urls));
                        continue;
                    }
                    Err(e) => tracing::warn!(
                        "{}: cannot read {}, discovering again: {}",
                        target.name,
                        url_file.display(),
                        e
                    ),
                }
            }

            if visited_any {
                self.config.politeness.category_delay.pause().await;
            }
            visited_any = true;

            let mut session = match self.factory.open().await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!("{}: could not open a session: {}", target.name, e);
                    continue;
                }
            };
            let report = frontier.discover(session.as_mut(), &mut target).await;
            drop(session);

            let rows: Vec<UrlRow> = target
                .urls()
                .iter()
                .map(|url| UrlRow {
                    book_url: url.clone(),
                    genre: target.name.clone(),
                })
                .collect();
            write_url_list(&url_file, &rows)?;
            self.ledger
                .record_category(self.run_id, &target.name, target.quota, report.discovered)?;

            tracing::info!(
                "{}: {} URLs written to {}",
                target.name,
                rows.len(),
                url_file.display()
            );

            per_category.push((target.name.clone(), target.urls().to_vec()));
            reports.push(report);
        }

        let combined = combine_url_lists(&per_category);
        let combined_path = self.store.directory().join(COMBINED_URLS_FILE);
        write_url_list(&combined_path, &combined)?;

        let shortfalls = reports.iter().filter(|r| !r.quota_met()).count();
        if shortfalls > 0 {
            tracing::warn!("{} categories finished below quota", shortfalls);
        }
        tracing::info!(
            "Combined URL list: {} unique URLs from {} categories in {}",
            combined.len(),
            per_category.len(),
            combined_path.display()
        );

        let urls = combined.into_iter().map(|row| row.book_url).collect();
        Ok((reports, urls))
    }

    /// Extracts records from `urls` batch by batch
    ///
    /// Batches already checkpointed by this run are skipped and their
    /// snapshots reloaded. Every other batch is planned, run and
    /// checkpointed before the next one starts.
    pub async fn extract(&mut self, urls: &[String]) -> Result<ExtractionReport, HarvestError> {
        let mut batches = plan_batches(urls, self.config.harvest.batch_size);
        if let Some(max) = self.config.harvest.max_batches {
            if batches.len() > max {
                tracing::info!(
                    "Limiting extraction to the first {} of {} batches",
                    max,
                    batches.len()
                );
                batches.truncate(max);
            }
        }

        let done = self.ledger.completed_batches(self.run_id)?;
        let done_ordinals: BTreeSet<usize> = done.iter().map(|b| b.ordinal).collect();
        let restored = self.store.resume(done.iter().filter_map(|b| {
            b.snapshot_path
                .as_ref()
                .map(|path| (b.ordinal, PathBuf::from(path)))
        }))?;
        if !done_ordinals.is_empty() {
            tracing::info!(
                "{} batches already checkpointed, {} records restored",
                done_ordinals.len(),
                restored
            );
        }

        let settings = WorkerSettings::from_config(&self.config);
        let worker_count = self.config.harvest.worker_count;
        let total = batches.len();
        let mut report = ExtractionReport::default();

        for batch in &batches {
            if done_ordinals.contains(&batch.ordinal) {
                tracing::debug!("Skipping checkpointed batch {}", batch.ordinal);
                report.batches_skipped += 1;
                continue;
            }

            tracing::info!(
                "Batch {}/{}: {} URLs across {} workers",
                batch.ordinal,
                total,
                batch.len(),
                worker_count
            );
            self.ledger
                .plan_batch(self.run_id, batch.ordinal, batch.len())?;
            self.ledger.start_batch(self.run_id, batch.ordinal)?;

            let outcome = run_batch(batch, Arc::clone(&self.factory), &settings, worker_count).await;

            let checkpoint = self.store.checkpoint_batch(batch.ordinal, &outcome.records)?;
            self.ledger.complete_batch(
                self.run_id,
                batch.ordinal,
                outcome.records.len(),
                outcome.failures,
                &checkpoint.snapshot.to_string_lossy(),
            )?;

            let stats = HarvestStatistics::from_records(&outcome.records);
            tracing::info!(
                "Batch {} done: {} records, {} failures, {} with rating, avg description {:.0} chars ({} total)",
                batch.ordinal,
                stats.records,
                outcome.failures,
                stats.with_rating,
                stats.avg_description_len,
                checkpoint.cumulative_size
            );

            report.batches_run += 1;
            report.records += outcome.records.len();
            report.failures += outcome.failures;
            report.incomplete += outcome.incomplete;
            report.fatal_workers += outcome.fatal_workers.len();
        }

        Ok(report)
    }

    /// Writes the final dataset and marks the run completed
    pub fn finish(&mut self) -> Result<FinalExport, HarvestError> {
        let export = self.store.finalize()?;
        self.ledger.complete_run(self.run_id)?;
        tracing::info!(
            "Run {} completed with {} records",
            self.run_id,
            export.statistics.records
        );
        Ok(export)
    }
}

/// Merges per-category URL lists, keeping the first occurrence of each URL
///
/// A URL found by several categories is attributed to the first of them.
pub fn combine_url_lists(lists: &[(String, Vec<String>)]) -> Vec<UrlRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (category, urls) in lists {
        for url in urls {
            if seen.insert(url.as_str()) {
                rows.push(UrlRow {
                    book_url: url.clone(),
                    genre: category.clone(),
                });
            }
        }
    }

    rows
}

/// Reads an extraction input list, dropping repeated URLs
fn load_url_input(path: &Path) -> Result<Vec<String>, HarvestError> {
    let urls = read_url_column(path, URL_COLUMN)?;
    let mut seen = HashSet::new();
    Ok(urls.into_iter().filter(|url| seen.insert(url.clone())).collect())
}

/// Runs a complete harvest with HTTP fetch sessions
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::load_config_with_hash;
/// use catalog_harvest::crawler::{run_harvest, HarvestOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = run_harvest(config, &hash, HarvestOptions::default()).await?;
/// println!("{} URLs harvested", summary.url_count);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: &str,
    options: HarvestOptions,
) -> Result<HarvestSummary, HarvestError> {
    let factory: Arc<dyn SessionFactory> =
        Arc::new(HttpSessionFactory::new(config.fetcher.clone()));
    let mut harvester = Harvester::new(config, config_hash, options.fresh, factory)?;
    harvester.run(&options).await
}
