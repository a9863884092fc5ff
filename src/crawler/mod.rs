//! Crawler module for discovery and extraction
//!
//! This module contains the core harvesting logic, including:
//! - Fetch sessions and page loading
//! - HTML parsing and link extraction
//! - Per-category frontier discovery
//! - Batch planning and the per-batch worker pool
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;
#[cfg(test)]
pub(crate) mod testing;
mod worker;

pub use coordinator::{
    combine_url_lists, run_harvest, ExtractionReport, HarvestMode, HarvestOptions,
    HarvestSummary, Harvester,
};
pub use fetcher::{
    build_http_client, load_page, FetchError, FetchSession, HttpSession, HttpSessionFactory,
    SessionFactory,
};
pub use frontier::{CategoryTarget, DiscoveryReport, Frontier};
pub use parser::{extract_links_simple, resolve_link, PageDocument};
pub use scheduler::{plan_batches, split_chunks, Batch, WorkerChunk};
pub use worker::{
    run_batch, run_worker, BatchOutcome, WorkerMessage, WorkerSettings, WorkerSummary,
    PROGRESS_INTERVAL,
};
