//! The three fetch strategies.
//!
//! All of them return an unordered `Vec<Record>`; callers that compare result
//! sets go through [`table_core::record::sorted_ids`].

use std::collections::HashMap;
use std::time::Duration;
use table_core::error::{FetchError, StoreError};
use table_core::partition::{Partition, PartitionPlan};
use table_core::record::Record;
use table_core::store::RecordStore;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio::time::{Instant, timeout_at};

/// Knobs shared by the strategies.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Upper bound on dispatch + merge for the concurrent strategy.
    pub deadline: Duration,
    /// Print the per-bucket progress lines to stdout.
    pub print_progress: bool,
}

impl FetchOptions {
    pub fn quiet(deadline: Duration) -> Self {
        Self {
            deadline,
            print_progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Bulk,
    Sequential,
    Concurrent,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Bulk, Strategy::Sequential, Strategy::Concurrent];

    /// Label used in the `"<label> took <duration>"` timing lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bulk => "Method 1",
            Self::Sequential => "Method 2",
            Self::Concurrent => "Method 3",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        }
    }

    pub async fn run<S: RecordStore>(
        &self,
        store: &S,
        plan: &PartitionPlan,
        options: &FetchOptions,
    ) -> Result<Vec<Record>, FetchError> {
        match self {
            Self::Bulk => bulk_fetch(store, plan.total()).await,
            Self::Sequential => sequential_fetch(store, plan, options).await,
            Self::Concurrent => concurrent_fetch(store, plan, options).await,
        }
    }
}

/// What one partition task reports back to the orchestrator.
#[derive(Debug)]
struct PartitionOutcome {
    partition: Partition,
    result: Result<Vec<Record>, StoreError>,
}

impl PartitionOutcome {
    fn into_batch(self) -> Result<Vec<Record>, FetchError> {
        let Partition { index, range } = self.partition;
        self.result
            .map_err(|source| FetchError::Partition {
                index,
                range,
                source,
            })
    }
}

/// Method 1: a single unpartitioned query for up to `limit` ids.
pub async fn bulk_fetch<S: RecordStore>(store: &S, limit: u64) -> Result<Vec<Record>, FetchError> {
    store.fetch_ids(limit).await.map_err(FetchError::Bulk)
}

/// Method 2: one range query per bucket, in bucket order, on the calling task.
///
/// Stops at the first failing bucket.
pub async fn sequential_fetch<S: RecordStore>(
    store: &S,
    plan: &PartitionPlan,
    options: &FetchOptions,
) -> Result<Vec<Record>, FetchError> {
    warn_on_remainder(plan);
    let mut records = Vec::new();

    for partition in plan.iter() {
        if options.print_progress {
            println!("{} of {}", partition.range.begin, plan.total());
        }
        let result = store.fetch_id_range(partition.range).await;
        let batch = PartitionOutcome { partition, result }.into_batch()?;
        log::trace!(
            "sequential: partition {} {} returned {} rows",
            partition.index,
            partition.range,
            batch.len()
        );
        records.extend(batch);
    }

    Ok(records)
}

/// Method 3: fan out one task per bucket, fan in over an unbounded channel.
///
/// Each task checks out its own pooled connection through a clone of `store`
/// and sends either its batch or its error. The merge returns as soon as one
/// of these happens:
///
/// * all `K` batches have arrived: `Ok` with every row,
/// * a partition reports an error: [`FetchError::Partition`],
/// * the deadline passes: [`FetchError::DeadlineExceeded`],
/// * a task panicked before sending: [`FetchError::PartitionPanicked`], or
///   [`FetchError::ChannelClosed`] if the dead task cannot be identified.
///
/// Any task still running when the merge gives up is aborted.
pub async fn concurrent_fetch<S: RecordStore>(
    store: &S,
    plan: &PartitionPlan,
    options: &FetchOptions,
) -> Result<Vec<Record>, FetchError> {
    let expected = plan.len();
    if expected == 0 {
        return Ok(Vec::new());
    }
    warn_on_remainder(plan);

    let deadline_at = Instant::now() + options.deadline;
    let (tx, mut rx) = mpsc::unbounded_channel::<PartitionOutcome>();
    let mut tasks = JoinSet::new();
    let mut spawned = HashMap::with_capacity(expected);

    for partition in plan.iter() {
        let store = store.clone();
        let tx = tx.clone();
        let handle = tasks.spawn(async move {
            let result = store.fetch_id_range(partition.range).await;
            // A closed receiver means the merge already gave up.
            let _ = tx.send(PartitionOutcome { partition, result });
        });
        spawned.insert(handle.id(), partition);
    }
    drop(tx);
    log::debug!("concurrent: dispatched {expected} partitions");

    let mut records = Vec::new();
    let mut received = 0;

    while received < expected {
        if options.print_progress {
            println!("{received} of {expected}");
        }
        let outcome = match timeout_at(deadline_at, rx.recv()).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                return Err(
                    dead_task_error(&mut tasks, &spawned, deadline_at, received, expected).await,
                );
            }
            Err(_) => {
                log::warn!(
                    "concurrent: deadline {:?} hit with {received}/{expected} partitions merged",
                    options.deadline
                );
                return Err(FetchError::DeadlineExceeded {
                    deadline: options.deadline,
                    received,
                    expected,
                });
            }
        };

        let index = outcome.partition.index;
        let batch = outcome.into_batch().inspect_err(|err| {
            log::error!("concurrent: aborting remaining partitions: {err}");
        })?;
        log::trace!("concurrent: partition {index} returned {} rows", batch.len());
        records.extend(batch);
        received += 1;
    }

    // Every task has sent its outcome; reap them so panics after the send
    // still surface in the log.
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            log::warn!("concurrent: partition task ended abnormally: {err}");
        }
    }

    Ok(records)
}

/// Every sender is gone but outcomes are missing: find the task that died
/// without reporting.
async fn dead_task_error(
    tasks: &mut JoinSet<()>,
    spawned: &HashMap<Id, Partition>,
    deadline_at: Instant,
    received: usize,
    expected: usize,
) -> FetchError {
    while let Ok(Some(joined)) = timeout_at(deadline_at, tasks.join_next_with_id()).await {
        let Err(err) = joined else { continue };
        if let Some(partition) = spawned.get(&err.id()) {
            log::error!(
                "concurrent: partition {} task ended abnormally: {err}",
                partition.index
            );
            return FetchError::PartitionPanicked {
                index: partition.index,
                range: partition.range,
                received,
                expected,
            };
        }
    }
    FetchError::ChannelClosed { received, expected }
}

fn warn_on_remainder(plan: &PartitionPlan) {
    if plan.has_remainder() {
        log::warn!(
            "{} rows do not divide into buckets of {}; last bucket spans {}",
            plan.total(),
            plan.bucket_size(),
            plan.span()
        );
    }
}
