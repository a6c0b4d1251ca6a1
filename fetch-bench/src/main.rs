//! Standalone benchmark runner that prints timing lines and the report.
//!
//! Reads its settings from the environment (a `.env` file is honoured); see
//! `table_core::config` for the variables. The table must already be
//! populated, e.g. by the `populator` binary.
//!
//! Usage:
//!   cargo run --release -p fetch-bench
//!   TABLE_DB_BACKEND=sqlite TABLE_SQLITE_PATH=large_table.db cargo run --release -p fetch-bench

use anyhow::Context;
use fetch_bench::fetch::FetchOptions;
use fetch_bench::report::print_report;
use fetch_bench::runner::{open_store, run_benchmark};
use std::process;
use table_core::config::{FetchConfig, LogSettings, load_dotenv};
use table_core::store::RecordStore;

async fn run() -> anyhow::Result<()> {
    let config = FetchConfig::from_env().context("invalid fetch configuration")?;
    log::info!(
        "Fetching {} rows in buckets of {} (deadline {:?}, {} round(s))",
        config.row_count,
        config.bucket_size,
        config.deadline,
        config.rounds
    );

    let store = open_store(&config)
        .await
        .with_context(|| format!("failed to connect to {}", config.target))?;

    let live = store
        .count_live()
        .await
        .context("failed to count rows in records")?;
    if live < config.row_count {
        log::warn!(
            "records holds {live} live rows, fewer than the {} being fetched",
            config.row_count
        );
    }

    let options = FetchOptions {
        deadline: config.deadline,
        print_progress: true,
    };
    let report = run_benchmark(&store, &config, &options).await?;
    print_report(&report);
    store.close().await;

    if !report.all_consistent() {
        log::warn!("Strategies returned different id sets; see the Check column.");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let dotenv_path = load_dotenv();
    let log_settings = LogSettings::from_env();
    if let Err(e) = table_core::initialize_logger(log_settings.level, log_settings.file.as_deref())
    {
        eprintln!("Failed to initialize logger: {e}. Exiting.");
        process::exit(1);
    }
    if let Some(path) = dotenv_path {
        log::debug!("Loaded environment from {}", path.display());
    }

    if let Err(e) = run().await {
        log::error!("Fetch benchmark failed: {e:#}");
        process::exit(1);
    }
}
