//! Fetch benchmark for the `records` table
//!
//! Measures three ways of reading back every id in `[1, N]`:
//! - **Method 1, bulk**: one `SELECT id ... LIMIT N`
//! - **Method 2, sequential**: one range query per bucket, issued in order
//! - **Method 3, concurrent**: one task per bucket, merged over a channel
//!
//! Run the benchmark: `cargo run --release -p fetch-bench`
//! Run criterion benches: `cargo bench -p fetch-bench`

pub mod fetch;
pub mod report;
pub mod runner;
