//! Table populator for the `records` table
//!
//! Creates the table if it is missing, then inserts placeholder rows one at a
//! time: no batching and no transaction, so every row costs one round trip.
//! The first failure stops the run.
//!
//! Run it: `cargo run --release -p populator`

use std::fmt;
use std::time::{Duration, Instant};
use table_core::config::PopulateConfig;
use table_core::error::PopulateError;
use table_core::record::PlaceholderRow;
use table_core::store::RecordStore;

/// What a completed run inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateSummary {
    pub inserted: u64,
    /// Id assigned to the first inserted row, if any row was inserted.
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
    pub elapsed: Duration,
}

impl PopulateSummary {
    pub fn rows_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.inserted as f64 / secs
    }
}

impl fmt::Display for PopulateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Inserted {} rows", self.inserted)?;
        if let (Some(first), Some(last)) = (self.first_id, self.last_id) {
            write!(f, " (ids {first}..={last})")?;
        }
        write!(
            f,
            " in {:?}, {:.0} rows/s",
            self.elapsed,
            self.rows_per_sec()
        )
    }
}

/// Ensure the table exists, then insert `config.row_count` placeholder rows.
///
/// With `print_progress`, prints `"{i} / {count}"` before insert `i` whenever
/// `i` is a multiple of `config.progress_every` (0 turns this off).
pub async fn populate<S: RecordStore>(
    store: &S,
    config: &PopulateConfig,
    print_progress: bool,
) -> Result<PopulateSummary, PopulateError> {
    store
        .ensure_schema()
        .await
        .map_err(PopulateError::Schema)?;
    log::info!(
        "Populating {} rows into {} store",
        config.row_count,
        store.backend()
    );

    let count = config.row_count;
    let start = Instant::now();
    let mut first_id = None;
    let mut last_id: Option<u64> = None;

    for i in 0..count {
        if print_progress && config.progress_every != 0 && i % config.progress_every == 0 {
            println!("{i} / {count}");
        }

        let id = store
            .insert_placeholder(&PlaceholderRow::now())
            .await
            .map_err(|source| PopulateError::Insert { index: i, source })?;

        if let Some(prev) = last_id {
            if id != prev + 1 {
                log::warn!("insert {i} got id {id} after {prev}; another writer is active");
            }
        }
        first_id.get_or_insert(id);
        last_id = Some(id);
    }

    Ok(PopulateSummary {
        inserted: count,
        first_id,
        last_id,
        elapsed: start.elapsed(),
    })
}
