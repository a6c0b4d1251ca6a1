//! Populator binary.
//!
//! Reads its settings from the environment (a `.env` file is honoured); see
//! `table_core::config` for the variables.
//!
//! Usage:
//!   cargo run --release -p populator
//!   TABLE_DB_BACKEND=sqlite TABLE_ROW_COUNT=50000 cargo run --release -p populator

use anyhow::Context;
use populator::populate;
use std::process;
use table_core::config::{ConnectionTarget, LogSettings, PopulateConfig, load_dotenv};
use table_core::store::AnyStore;

async fn run() -> anyhow::Result<()> {
    let config = PopulateConfig::from_env().context("invalid populator configuration")?;
    if config.target == ConnectionTarget::Memory {
        log::warn!("Memory backend selected: rows are discarded at exit, timing only");
    }
    let store = AnyStore::open(&config.target, &config.pool)
        .await
        .with_context(|| format!("failed to connect to {}", config.target))?;

    let summary = populate(&store, &config, true).await?;
    store.close().await;

    log::info!("{summary}");
    println!("{summary}");
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
        log::error!("Populator failed: {e:#}");
        process::exit(1);
    }
}
