//! Extraction worker pool
//!
//! One batch is processed by a fixed number of workers, each running as its
//! own task with its own fetch session. Workers stream their results to a
//! single collector over a channel, so no record list is ever shared between
//! tasks. A worker that panics loses only the items it had not yet delivered.

use crate::config::{Config, DelayRange};
use crate::crawler::fetcher::{load_page, FetchError, SessionFactory};
use crate::crawler::scheduler::{split_chunks, Batch, WorkerChunk};
use crate::extract::{extract_record, BookRecord};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Items between two progress lines of one worker
pub const PROGRESS_INTERVAL: usize = 20;

/// Per-item settings shared by every worker of a batch
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub item_delay: DelayRange,
    pub ready_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            item_delay: config.politeness.item_delay,
            ready_timeout: config.fetcher.ready_timeout(),
        }
    }
}

/// Messages sent from workers to the batch collector
#[derive(Debug)]
pub enum WorkerMessage {
    /// A record was extracted
    Record { worker_id: usize, record: BookRecord },

    /// An item could not be fetched
    Failed {
        worker_id: usize,
        url: String,
        error: FetchError,
    },

    /// The worker went through its whole chunk
    Finished(WorkerSummary),
}

/// Counters reported by a worker when it finishes its chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub processed: usize,
    pub kept: usize,
    pub failed: usize,
    /// Pages that loaded but lacked a title or author
    pub incomplete: usize,
}

/// Everything one batch produced
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub ordinal: usize,
    /// Records in the order they were delivered
    pub records: Vec<BookRecord>,
    pub failures: usize,
    pub incomplete: usize,
    /// Workers that stopped before finishing their chunk
    pub fatal_workers: Vec<usize>,
}

/// Running figures a worker logs every [`PROGRESS_INTERVAL`] items
#[derive(Debug, Default)]
struct WorkerProgress {
    kept: usize,
    with_rating: usize,
    description_chars: usize,
}

impl WorkerProgress {
    fn add(&mut self, record: &BookRecord) {
        self.kept += 1;
        if record.rating.is_some() {
            self.with_rating += 1;
        }
        self.description_chars += record.description_len();
    }

    fn avg_description_len(&self) -> f64 {
        if self.kept == 0 {
            0.0
        } else {
            self.description_chars as f64 / self.kept as f64
        }
    }
}

/// Processes one chunk with a session of its own
///
/// An empty chunk returns immediately without opening a session. The session
/// is dropped on every exit path, including a panic.
pub async fn run_worker(
    chunk: WorkerChunk,
    factory: Arc<dyn SessionFactory>,
    settings: WorkerSettings,
    tx: mpsc::UnboundedSender<WorkerMessage>,
) -> WorkerSummary {
    let worker_id = chunk.worker_id;
    let mut summary = WorkerSummary {
        worker_id,
        ..Default::default()
    };

    if chunk.is_empty() {
        tracing::debug!("Worker {} has nothing to do", worker_id);
        let _ = tx.send(WorkerMessage::Finished(summary.clone()));
        return summary;
    }

    let total = chunk.urls.len();
    tracing::info!("Worker {} starting on {} URLs", worker_id, total);

    let mut session = match factory.open().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Worker {} could not open a session: {}", worker_id, e);
            for url in chunk.urls {
                summary.processed += 1;
                summary.failed += 1;
                let _ = tx.send(WorkerMessage::Failed {
                    worker_id,
                    url,
                    error: e.clone(),
                });
            }
            let _ = tx.send(WorkerMessage::Finished(summary.clone()));
            return summary;
        }
    };

    let mut progress = WorkerProgress::default();

    for (index, url) in chunk.urls.into_iter().enumerate() {
        if index > 0 {
            settings.item_delay.pause().await;
        }
        summary.processed += 1;

        match load_page(session.as_mut(), &url, settings.ready_timeout, true).await {
            Ok(content) => match extract_record(&content) {
                Some(record) => {
                    progress.add(&record);
                    summary.kept += 1;
                    let _ = tx.send(WorkerMessage::Record { worker_id, record });
                }
                None => {
                    tracing::debug!("Worker {}: no title/author on {}", worker_id, url);
                    summary.incomplete += 1;
                }
            },
            Err(error) => {
                tracing::warn!("Worker {}: skipping {}: {}", worker_id, url, error);
                summary.failed += 1;
                let _ = tx.send(WorkerMessage::Failed {
                    worker_id,
                    url,
                    error,
                });
            }
        }

        if summary.processed % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                "Worker {}: {}/{} processed, {} kept, {} with rating, avg description {:.0} chars",
                worker_id,
                summary.processed,
                total,
                progress.kept,
                progress.with_rating,
                progress.avg_description_len()
            );
        }
    }

    drop(session);
    tracing::info!(
        "Worker {} finished: {} kept, {} failed, {} incomplete",
        worker_id,
        summary.kept,
        summary.failed,
        summary.incomplete
    );

    let _ = tx.send(WorkerMessage::Finished(summary.clone()));
    summary
}

/// Runs one batch across `worker_count` workers and collects their output
///
/// The pool lives only for this batch. Worker panics are logged and reported
/// in [`BatchOutcome::fatal_workers`]; they never fail the batch.
pub async fn run_batch(
    batch: &Batch,
    factory: Arc<dyn SessionFactory>,
    settings: &WorkerSettings,
    worker_count: usize,
) -> BatchOutcome {
    let chunks = split_chunks(&batch.members, worker_count);
    let worker_ids: Vec<usize> = chunks.iter().map(|c| c.worker_id).collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut pool = JoinSet::new();

    for chunk in chunks {
        let tx = tx.clone();
        let factory = Arc::clone(&factory);
        let settings = settings.clone();
        pool.spawn(run_worker(chunk, factory, settings, tx));
    }
    drop(tx);

    let total = batch.members.len();
    let ordinal = batch.ordinal;

    let collect = async move {
        let mut outcome = BatchOutcome {
            ordinal,
            ..Default::default()
        };
        let mut finished = BTreeSet::new();
        let mut handled = 0;

        while let Some(message) = rx.recv().await {
            match message {
                WorkerMessage::Record { record, .. } => {
                    outcome.records.push(record);
                    handled += 1;
                }
                WorkerMessage::Failed { .. } => {
                    outcome.failures += 1;
                    handled += 1;
                }
                WorkerMessage::Finished(summary) => {
                    outcome.incomplete += summary.incomplete;
                    finished.insert(summary.worker_id);
                    tracing::debug!(
                        "Batch {}: {} records collected, {} failures so far",
                        ordinal,
                        outcome.records.len(),
                        outcome.failures
                    );
                }
            }

            if handled > 0 && handled % PROGRESS_INTERVAL == 0 {
                tracing::debug!("Batch {}: {}/{} items delivered", ordinal, handled, total);
            }
        }

        (outcome, finished)
    };

    let supervise = async {
        let mut panicked = 0;
        while let Some(result) = pool.join_next().await {
            if let Err(e) = result {
                tracing::error!("Batch {}: worker task failed: {}", ordinal, e);
                panicked += 1;
            }
        }
        panicked
    };

    let ((mut outcome, finished), panicked) = tokio::join!(collect, supervise);

    outcome.fatal_workers = worker_ids
        .into_iter()
        .filter(|id| !finished.contains(id))
        .collect();

    if panicked > 0 {
        tracing::error!(
            "Batch {}: {} worker(s) died ({:?}), their delivered records are kept",
            ordinal,
            panicked,
            outcome.fatal_workers
        );
    }

    tracing::info!(
        "Batch {} complete: {} records, {} failures, {} incomplete pages",
        ordinal,
        outcome.records.len(),
        outcome.failures,
        outcome.incomplete
    );

    outcome
}
