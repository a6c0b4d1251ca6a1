//! Drives the strategies in order, times them and cross-checks their results.

use crate::fetch::{FetchOptions, Strategy};
use crate::report::{BenchReport, StrategyResult};
use std::time::Instant;
use table_core::config::{ConnectionTarget, FetchConfig};
use table_core::error::{FetchError, StoreError};
use table_core::partition::PartitionPlan;
use table_core::record::sorted_ids;
use table_core::store::{AnyStore, MemoryStore, RecordStore};

/// Open the store the benchmark reads from.
///
/// The memory backend has nothing to read unless it is filled first, so it
/// comes back already holding `config.row_count` live rows.
pub async fn open_store(config: &FetchConfig) -> Result<AnyStore, StoreError> {
    match config.target {
        ConnectionTarget::Memory => {
            log::info!("Seeding memory store with {} rows", config.row_count);
            Ok(AnyStore::Memory(MemoryStore::seeded(config.row_count)))
        }
        _ => AnyStore::open(&config.target, &config.pool).await,
    }
}

/// Run every strategy `config.rounds` times against `store`.
///
/// Prints `"<label> took <duration>"` after each strategy. After each round
/// the sequential and concurrent id sets are compared with the bulk fetch;
/// a difference marks that strategy inconsistent but does not stop the run.
/// Any fetch error stops the run and is returned.
pub async fn run_benchmark<S: RecordStore>(
    store: &S,
    config: &FetchConfig,
    options: &FetchOptions,
) -> Result<BenchReport, FetchError> {
    let plan = PartitionPlan::new(config.row_count, config.bucket_size)?;
    let mut results: Vec<StrategyResult> =
        Strategy::ALL.iter().map(|&s| StrategyResult::new(s)).collect();

    for round in 1..=config.rounds {
        log::info!("Round {round}/{}", config.rounds);
        let mut baseline: Option<Vec<u64>> = None;

        for result in results.iter_mut() {
            let strategy = result.strategy;
            let start = Instant::now();
            let records = strategy.run(store, &plan, options).await?;
            let elapsed = start.elapsed();
            println!("{} took {:?}", strategy.label(), elapsed);
            result.add_sample(elapsed, records.len());

            let ids = sorted_ids(&records);
            if let Some(expected) = baseline.as_ref() {
                if *expected != ids {
                    log::warn!(
                        "{} returned {} ids that differ from the bulk fetch ({} ids)",
                        strategy.name(),
                        ids.len(),
                        expected.len()
                    );
                    result.consistent = false;
                }
            } else {
                baseline = Some(ids);
            }
        }
    }

    Ok(BenchReport {
        backend: store.backend().to_string(),
        row_count: config.row_count,
        bucket_size: config.bucket_size,
        partitions: plan.len(),
        rounds: config.rounds,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use table_core::config::PoolSettings;
    use table_core::store::MemoryStore;

    fn config(row_count: u64, bucket_size: u64, rounds: u32) -> FetchConfig {
        FetchConfig {
            row_count,
            bucket_size,
            deadline: Duration::from_secs(5),
            rounds,
            target: ConnectionTarget::Memory,
            pool: PoolSettings::default(),
        }
    }

    #[tokio::test]
    async fn every_strategy_is_sampled_each_round() {
        let store = MemoryStore::seeded(200);
        let report = run_benchmark(
            &store,
            &config(200, 25, 3),
            &FetchOptions::quiet(Duration::from_secs(5)),
        )
        .await
        .unwrap();

        assert_eq!(report.partitions, 8);
        assert_eq!(report.results.len(), 3);
        for result in &report.results {
            assert_eq!(result.durations.len(), 3);
            assert_eq!(result.rows, 200);
        }
        assert!(report.all_consistent());
    }

    #[tokio::test]
    async fn deleted_rows_are_missing_from_every_strategy() {
        // Nothing exists beyond id N, so the bulk LIMIT and the partitions
        // both see the same N - 1 live rows.
        let store = MemoryStore::seeded(50);
        store.mark_deleted(1).unwrap();
        let report = run_benchmark(
            &store,
            &config(50, 10, 1),
            &FetchOptions::quiet(Duration::from_secs(5)),
        )
        .await
        .unwrap();
        assert!(report.all_consistent());
        assert_eq!(report.result(Strategy::Concurrent).unwrap().rows, 49);
    }

    #[tokio::test]
    async fn live_rows_beyond_n_make_partitioned_results_differ() {
        // Bulk fills its limit from ids past N; the partitions stop at N.
        let store = MemoryStore::seeded(60);
        store.mark_deleted(5).unwrap();
        let report = run_benchmark(
            &store,
            &config(50, 10, 1),
            &FetchOptions::quiet(Duration::from_secs(5)),
        )
        .await
        .unwrap();
        assert_eq!(report.result(Strategy::Bulk).unwrap().rows, 50);
        assert_eq!(report.result(Strategy::Sequential).unwrap().rows, 49);
        assert!(!report.result(Strategy::Sequential).unwrap().consistent);
        assert!(!report.result(Strategy::Concurrent).unwrap().consistent);
        assert!(report.result(Strategy::Bulk).unwrap().consistent);
    }

    #[tokio::test]
    async fn memory_target_runs_end_to_end() {
        let config = config(1_000, 100, 1);
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.count_live().await.unwrap(), 1_000);

        let report = run_benchmark(&store, &config, &FetchOptions::quiet(config.deadline))
            .await
            .unwrap();
        assert_eq!(report.backend, "memory");
        for result in &report.results {
            assert_eq!(result.rows, 1_000);
        }
        assert!(report.all_consistent());
    }

    #[tokio::test]
    async fn invalid_bucket_size_is_rejected_before_any_query() {
        let store = MemoryStore::seeded(10);
        let err = run_benchmark(
            &store,
            &config(10, 0, 1),
            &FetchOptions::quiet(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::InvalidBucketSize));
    }
}
