//! Batch scheduling
//!
//! This module handles:
//! - Partitioning the combined URL list into fixed-size, 1-based batches
//! - Splitting one batch into near-equal contiguous chunks, one per worker
//!
//! Both operations are pure. Concatenating the chunks of a batch in worker
//! order always reproduces the batch exactly.

use crate::state::BatchStatus;

/// A consecutive slice of the URL list processed and checkpointed as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position of the batch in the run
    pub ordinal: usize,

    /// Canonical URLs in assignment order
    pub members: Vec<String>,

    pub status: BatchStatus,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The contiguous share of a batch assigned to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerChunk {
    /// 1-based worker number within the batch
    pub worker_id: usize,

    pub urls: Vec<String>,
}

impl WorkerChunk {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Partitions `urls` into consecutive batches of `batch_size`
///
/// The last batch may be shorter. Every batch starts out `Pending`.
///
/// # Example
///
/// ```
/// use catalog_harvest::crawler::plan_batches;
///
/// let urls: Vec<String> = (0..5).map(|i| format!("u{}", i)).collect();
/// let batches = plan_batches(&urls, 2);
/// assert_eq!(batches.len(), 3);
/// assert_eq!(batches[2].ordinal, 3);
/// assert_eq!(batches[2].members, vec!["u4"]);
/// ```
pub fn plan_batches(urls: &[String], batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);

    urls.chunks(batch_size)
        .enumerate()
        .map(|(index, members)| Batch {
            ordinal: index + 1,
            members: members.to_vec(),
            status: BatchStatus::Pending,
        })
        .collect()
}

/// Splits a batch into exactly `worker_count` contiguous chunks
///
/// Each chunk holds `n / w` URLs and the first `n % w` chunks take one extra.
/// When the batch is smaller than the worker count the trailing chunks are
/// empty.
pub fn split_chunks(members: &[String], worker_count: usize) -> Vec<WorkerChunk> {
    let worker_count = worker_count.max(1);
    let base = members.len() / worker_count;
    let remainder = members.len() % worker_count;

    let mut chunks = Vec::with_capacity(worker_count);
    let mut start = 0;

    for index in 0..worker_count {
        let size = base + usize::from(index < remainder);
        chunks.push(WorkerChunk {
            worker_id: index + 1,
            urls: members[start..start + size].to_vec(),
        });
        start += size;
    }

    chunks
}
