//! Fault injection: a wrapper store that fails, hangs or panics on chosen
//! buckets, used to check how each strategy stops.

use fetch_bench::fetch::{FetchOptions, concurrent_fetch, sequential_fetch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use table_core::error::{FetchError, StoreError};
use table_core::partition::{IdRange, PartitionPlan};
use table_core::record::{PlaceholderRow, Record};
use table_core::store::{MemoryStore, RecordStore};

#[derive(Debug, Clone, Copy)]
enum Fault {
    /// The range starting at this id returns an error.
    Fail(u64),
    /// The range starting at this id never completes.
    Hang(u64),
    /// The task reading the range starting at this id panics.
    Panic(u64),
}

impl Fault {
    fn begin(&self) -> u64 {
        match *self {
            Fault::Fail(b) | Fault::Hang(b) | Fault::Panic(b) => b,
        }
    }
}

/// Counts dropped hung queries, i.e. tasks that were aborted.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct FaultyStore {
    inner: MemoryStore,
    faults: Arc<Vec<Fault>>,
    range_calls: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
}

impl FaultyStore {
    fn new(rows: u64, faults: Vec<Fault>) -> Self {
        Self {
            inner: MemoryStore::seeded(rows),
            faults: Arc::new(faults),
            range_calls: Arc::new(AtomicUsize::new(0)),
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

impl RecordStore for FaultyStore {
    fn backend(&self) -> &'static str {
        "faulty"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.inner.ensure_schema().await
    }

    async fn insert_placeholder(&self, row: &PlaceholderRow) -> Result<u64, StoreError> {
        self.inner.insert_placeholder(row).await
    }

    async fn count_live(&self) -> Result<u64, StoreError> {
        self.inner.count_live().await
    }

    async fn fetch_ids(&self, limit: u64) -> Result<Vec<Record>, StoreError> {
        self.inner.fetch_ids(limit).await
    }

    async fn fetch_id_range(&self, range: IdRange) -> Result<Vec<Record>, StoreError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        match self.faults.iter().find(|f| f.begin() == range.begin) {
            Some(Fault::Fail(_)) => Err(StoreError::Injected {
                reason: format!("range {range} refused"),
            }),
            Some(Fault::Hang(_)) => {
                let _guard = DropCounter(self.abandoned.clone());
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(Fault::Panic(_)) => panic!("range {range} panicked"),
            None => self.inner.fetch_id_range(range).await,
        }
    }
}

fn options(deadline: Duration) -> FetchOptions {
    FetchOptions::quiet(deadline)
}

/// First id of bucket `index` for bucket size `bucket`.
fn begin_of(index: u64, bucket: u64) -> u64 {
    1 + index * bucket
}

#[tokio::test]
async fn failure_in_any_partition_is_reported_by_index() {
    let plan = PartitionPlan::new(100, 10).unwrap();
    for index in 0..plan.len() {
        let store = FaultyStore::new(100, vec![Fault::Fail(begin_of(index as u64, 10))]);
        let deadline = Duration::from_secs(5);
        let start = Instant::now();

        let err = concurrent_fetch(&store, &plan, &options(deadline))
            .await
            .unwrap_err();
        assert!(start.elapsed() < deadline);
        match err {
            FetchError::Partition {
                index: failed,
                range,
                source: StoreError::Injected { .. },
            } => {
                assert_eq!(failed, index);
                assert_eq!(range, plan.partition(index).unwrap().range);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn failure_wins_over_a_hung_partition() {
    let store = FaultyStore::new(50, vec![Fault::Hang(1), Fault::Fail(21)]);
    let plan = PartitionPlan::new(50, 10).unwrap();
    let deadline = Duration::from_secs(10);
    let start = Instant::now();

    let err = concurrent_fetch(&store, &plan, &options(deadline))
        .await
        .unwrap_err();
    assert_eq!(err.partition_index(), Some(2));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn hung_partition_hits_the_deadline() {
    let store = FaultyStore::new(40, vec![Fault::Hang(11)]);
    let plan = PartitionPlan::new(40, 10).unwrap();
    let deadline = Duration::from_millis(200);
    let start = Instant::now();

    let err = concurrent_fetch(&store, &plan, &options(deadline))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();
    assert!(elapsed >= deadline);
    assert!(elapsed < Duration::from_secs(5));
    match err {
        FetchError::DeadlineExceeded {
            deadline: reported,
            received,
            expected,
        } => {
            assert_eq!(reported, deadline);
            assert_eq!(expected, 4);
            assert!(received <= 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn hung_partition_is_aborted_after_the_deadline() {
    let store = FaultyStore::new(30, vec![Fault::Hang(21)]);
    let plan = PartitionPlan::new(30, 10).unwrap();

    let err = concurrent_fetch(&store, &plan, &options(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::DeadlineExceeded { .. }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.abandoned(), 1);
}

#[tokio::test]
async fn panicking_partition_is_named() {
    let store = FaultyStore::new(30, vec![Fault::Panic(11)]);
    let plan = PartitionPlan::new(30, 10).unwrap();

    let err = concurrent_fetch(&store, &plan, &options(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.partition_index(), Some(1));
    match err {
        FetchError::PartitionPanicked {
            index,
            range,
            received,
            expected,
        } => {
            assert_eq!(index, 1);
            assert_eq!(range, IdRange::new(11, 21));
            assert_eq!(received, 2);
            assert_eq!(expected, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_partition_is_named_on_a_worker_pool() {
    let store = FaultyStore::new(80, vec![Fault::Panic(begin_of(6, 10))]);
    let plan = PartitionPlan::new(80, 10).unwrap();

    let err = concurrent_fetch(&store, &plan, &options(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::PartitionPanicked { index: 6, .. }));
}

#[tokio::test]
async fn sequential_stops_at_the_failing_partition() {
    let store = FaultyStore::new(50, vec![Fault::Fail(begin_of(2, 10))]);
    let plan = PartitionPlan::new(50, 10).unwrap();

    let err = sequential_fetch(&store, &plan, &options(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.partition_index(), Some(2));
    assert_eq!(store.range_calls(), 3);
}

#[tokio::test]
async fn randomly_chosen_failing_partition_is_reported() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..8 {
        let bucket = rng.gen_range(1..=20u64);
        let total = rng.gen_range(1..=200u64);
        let plan = PartitionPlan::new(total, bucket).unwrap();
        let index = rng.gen_range(0..plan.len());

        let store = FaultyStore::new(total, vec![Fault::Fail(begin_of(index as u64, bucket))]);
        let err = concurrent_fetch(&store, &plan, &options(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err.partition_index(), Some(index), "N={total} B={bucket}");
    }
}

#[tokio::test]
async fn healthy_store_passes_through() {
    let store = FaultyStore::new(25, Vec::new());
    let plan = PartitionPlan::new(25, 5).unwrap();
    let records = concurrent_fetch(&store, &plan, &options(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(records.len(), 25);
    assert_eq!(store.range_calls(), 5);
}
