//! Criterion benchmark harness: times the three fetch strategies against an
//! in-memory SQLite table at two bucket sizes.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use fetch_bench::fetch::{FetchOptions, Strategy};
use std::time::Duration;
use table_core::partition::PartitionPlan;
use table_core::record::PlaceholderRow;
use table_core::store::{RecordStore, SqliteStore};
use tokio::runtime::Runtime;

const ROWS: u64 = 20_000;

/// Bucket sizes to benchmark.
fn bucket_sizes() -> Vec<(&'static str, u64)> {
    vec![
        ("b2k", 2_000), // 10 partitions
        ("b500", 500), // 40 partitions
    ]
}

/// Create an in-memory SQLite table holding `ROWS` rows.
fn setup_store(rt: &Runtime) -> SqliteStore {
    rt.block_on(async {
        let store = SqliteStore::in_memory()
            .await
            .expect("Failed to open in-memory SQLite");
        store.ensure_schema().await.expect("Failed to create table");
        let row = PlaceholderRow::now();
        for _ in 0..ROWS {
            store.insert_placeholder(&row).await.expect("Failed to insert");
        }
        store
    })
}

fn bench_strategies(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to build tokio runtime");
    let store = setup_store(&rt);
    let options = FetchOptions::quiet(Duration::from_secs(60));

    for strategy in Strategy::ALL {
        let mut group = c.benchmark_group(format!("fetch/{}", strategy.name()));
        group.measurement_time(Duration::from_secs(10));
        group.sample_size(30);

        for (label, bucket) in bucket_sizes() {
            let plan = PartitionPlan::new(ROWS, bucket).expect("bucket size");
            group.bench_with_input(BenchmarkId::from_parameter(label), &plan, |b, plan| {
                b.iter(|| {
                    let records = rt
                        .block_on(strategy.run(&store, plan, &options))
                        .expect("fetch failed");
                    assert_eq!(records.len() as u64, ROWS);
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
