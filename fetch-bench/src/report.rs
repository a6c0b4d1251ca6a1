//! Report module: prints human-readable timing results per strategy.

use crate::fetch::Strategy;
use std::time::Duration;

/// Timing samples for one strategy across every benchmark round.
#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub strategy: Strategy,
    pub durations: Vec<Duration>,
    /// Rows returned in the most recent round.
    pub rows: usize,
    /// False once any round returned a different id set than the bulk fetch.
    pub consistent: bool,
}

impl StrategyResult {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            durations: Vec::new(),
            rows: 0,
            consistent: true,
        }
    }

    pub fn add_sample(&mut self, elapsed: Duration, rows: usize) {
        self.durations.push(elapsed);
        self.rows = rows;
    }

    pub fn mean_ms(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.durations.iter().map(|d| d.as_secs_f64() * 1e3).sum();
        sum / self.durations.len() as f64
    }

    pub fn min_ms(&self) -> f64 {
        self.sorted_ms().first().copied().unwrap_or(0.0)
    }

    pub fn max_ms(&self) -> f64 {
        self.sorted_ms().last().copied().unwrap_or(0.0)
    }

    pub fn percentile_ms(&self, pct: f64) -> f64 {
        let sorted = self.sorted_ms();
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Rows per second at the mean duration.
    pub fn rows_per_sec(&self) -> f64 {
        let mean = self.mean_ms();
        if mean <= 0.0 {
            return 0.0;
        }
        self.rows as f64 / (mean / 1e3)
    }

    fn sorted_ms(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self
            .durations
            .iter()
            .map(|d| d.as_secs_f64() * 1e3)
            .collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }
}

/// Everything one benchmark run produced.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub backend: String,
    pub row_count: u64,
    pub bucket_size: u64,
    pub partitions: usize,
    pub rounds: u32,
    pub results: Vec<StrategyResult>,
}

impl BenchReport {
    pub fn result(&self, strategy: Strategy) -> Option<&StrategyResult> {
        self.results.iter().find(|r| r.strategy == strategy)
    }

    pub fn all_consistent(&self) -> bool {
        self.results.iter().all(|r| r.consistent)
    }

    /// Mean duration of `strategy` relative to the bulk fetch; >1 is faster.
    pub fn speedup_vs_bulk(&self, strategy: Strategy) -> Option<f64> {
        let bulk = self.result(Strategy::Bulk)?.mean_ms();
        let other = self.result(strategy)?.mean_ms();
        if other <= 0.0 {
            return None;
        }
        Some(bulk / other)
    }
}

/// Print a formatted report comparing the strategies.
pub fn print_report(report: &BenchReport) {
    println!("\n{}", "=".repeat(80));
    println!("  Fetch Benchmark Report");
    println!(
        "  Backend: {} | N = {} | B = {} | K = {} | rounds = {}",
        report.backend, report.row_count, report.bucket_size, report.partitions, report.rounds
    );
    println!("{}", "=".repeat(80));

    println!(
        "\n  {:24} {:>10} {:>10} {:>10} {:>10} {:>12} {:>8} {:>9}",
        "Strategy", "Rows", "Mean (ms)", "Min (ms)", "p95 (ms)", "Rows/s", "vs bulk", "Check"
    );
    println!("  {}", "-".repeat(100));
    for r in &report.results {
        let label = format!("{} ({})", r.strategy.label(), r.strategy.name());
        let speedup = report
            .speedup_vs_bulk(r.strategy)
            .map(|s| format!("{s:.2}x"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:24} {:>10} {:>10.1} {:>10.1} {:>10.1} {:>12.0} {:>8} {:>9}",
            label,
            r.rows,
            r.mean_ms(),
            r.min_ms(),
            r.percentile_ms(95.0),
            r.rows_per_sec(),
            speedup,
            if r.consistent { "OK" } else { "MISMATCH" }
        );
    }

    println!("\n{}", "=".repeat(80));
    println!();
}
