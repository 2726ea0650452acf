//! Running counters for the pipeline.
//!
//! One [`PipelineStats`] is created at startup and handed to the pipeline as
//! an `Arc`; per-line tasks and the dispatch step update it without locks.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineStats {
    cycles: AtomicU64,
    lines_succeeded: AtomicU64,
    lines_failed: AtomicU64,
    vehicles_processed: AtomicU64,
    dispatch_failures: AtomicU64,
    // unix seconds, 0 = never
    last_success: AtomicI64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub lines_succeeded: u64,
    pub lines_failed: u64,
    pub vehicles_processed: u64,
    pub dispatch_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line_success(&self, vehicles: usize) {
        self.lines_succeeded.fetch_add(1, Ordering::Relaxed);
        self.vehicles_processed
            .fetch_add(vehicles as u64, Ordering::Relaxed);
    }

    pub fn record_line_failure(&self) {
        self.lines_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks a cycle in which at least one line succeeded.
    pub fn mark_success(&self, at: DateTime<Utc>) {
        self.last_success.store(at.timestamp(), Ordering::Relaxed);
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        match self.last_success.load(Ordering::Relaxed) {
            0 => None,
            secs => DateTime::from_timestamp(secs, 0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            lines_succeeded: self.lines_succeeded.load(Ordering::Relaxed),
            lines_failed: self.lines_failed.load(Ordering::Relaxed),
            vehicles_processed: self.vehicles_processed.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            last_success: self.last_success(),
        }
    }
}
