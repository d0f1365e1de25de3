//! Running statistics over collection runs.
//!
//! Kept in memory for the lifetime of the process and logged after every run.

use tracing::info;

use crate::collector::RunSummary;

/// Running statistics for a single value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Totals across every run since startup.
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub runs: u64,
    pub failed_runs: u64,
    pub target_failures: u64,
    pub records_total: u64,
    pub records_per_run: RunningStat,
    pub run_duration_seconds: RunningStat,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts a completed run.
    pub fn record_run(&mut self, summary: &RunSummary) {
        let records = summary.records() as u64;
        self.runs += 1;
        self.target_failures += summary.failed.len() as u64;
        self.records_total += records;
        self.records_per_run.add(records as f64);
        self.run_duration_seconds.add(summary.duration_seconds);
    }

    /// Accounts a run in which every target failed.
    pub fn record_failed_run(&mut self, targets: usize) {
        self.runs += 1;
        self.failed_runs += 1;
        self.target_failures += targets as u64;
    }

    pub fn log_summary(&self) {
        info!(
            "Run {}: {} records (avg {:.1}/run, {} total), duration last {:.2}s min {:.2}s avg {:.2}s max {:.2}s, {} failed runs, {} target failures",
            self.runs,
            self.records_per_run.last() as u64,
            self.records_per_run.avg(),
            self.records_total,
            self.run_duration_seconds.last(),
            self.run_duration_seconds.min(),
            self.run_duration_seconds.avg(),
            self.run_duration_seconds.max(),
            self.failed_runs,
            self.target_failures
        );
    }
}
