// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for tracker bookkeeping.
//!
//! Each tracker owns its own counters, so independent trackers (and tests)
//! never observe each other's numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Counters describing what a tracker has done since creation.
#[derive(Debug, Default)]
pub struct TrackerMetrics {
    operations_started: AtomicU64,
    operations_completed: AtomicU64,
    failed_roots: AtomicU64,
    legs_scheduled: AtomicU64,
    legs_aborted: AtomicU64,
    legs_pruned: AtomicU64,
    untracked_wraps: AtomicU64,
    listener_failures: AtomicU64,
    total_durations: Mutex<Histogram>,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_operation_started(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_operation_completed(&self, total: Duration, success: bool) {
        self.operations_completed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_roots.fetch_add(1, Ordering::Relaxed);
        }
        self.total_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(total);
    }

    pub(crate) fn record_leg_scheduled(&self) {
        self.legs_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_leg_aborted(&self) {
        self.legs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_legs_pruned(&self, count: usize) {
        self.legs_pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_untracked_wrap(&self) {
        self.untracked_wraps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations_started: self.operations_started.load(Ordering::Relaxed),
            operations_completed: self.operations_completed.load(Ordering::Relaxed),
            failed_roots: self.failed_roots.load(Ordering::Relaxed),
            legs_scheduled: self.legs_scheduled.load(Ordering::Relaxed),
            legs_aborted: self.legs_aborted.load(Ordering::Relaxed),
            legs_pruned: self.legs_pruned.load(Ordering::Relaxed),
            untracked_wraps: self.untracked_wraps.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            total_durations: self
                .total_durations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    /// Default: [1ms, 10ms, 100ms, 1s, 10s, 60s, +inf]
    buckets: Vec<u64>,

    /// Count per bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Get bucket boundaries.
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Total number of recorded values.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Calculate approximate percentile (p50, p90, p99, etc.).
    pub fn percentile(&self, p: f64) -> Duration {
        let total = self.total();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                // Overflow bucket reports ten times the last boundary
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    /// Get p50 (median) latency.
    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    /// Get p99 latency.
    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_buckets(vec![1_000, 10_000, 100_000, 1_000_000, 10_000_000, 60_000_000])
    }
}

/// A snapshot of tracker metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations_started: u64,
    pub operations_completed: u64,
    /// Completed operations whose root leg failed.
    pub failed_roots: u64,
    pub legs_scheduled: u64,
    pub legs_aborted: u64,
    /// Legs removed because a mutually exclusive sibling fired.
    pub legs_pruned: u64,
    /// Wraps requested with no operation current.
    pub untracked_wraps: u64,
    pub listener_failures: u64,
    /// Distribution of operation total durations.
    pub total_durations: Histogram,
}

impl MetricsSnapshot {
    /// Operations started but not yet completed.
    pub fn open_operations(&self) -> u64 {
        self.operations_started
            .saturating_sub(self.operations_completed)
    }

    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Tracker Report ===\n\n");
        report.push_str(&format!(
            "Operations: {} started, {} completed, {} open, {} failed\n",
            self.operations_started,
            self.operations_completed,
            self.open_operations(),
            self.failed_roots
        ));
        report.push_str(&format!(
            "Legs: {} scheduled, {} aborted, {} pruned\n",
            self.legs_scheduled, self.legs_aborted, self.legs_pruned
        ));
        report.push_str(&format!(
            "Untracked wraps: {}, listener failures: {}\n",
            self.untracked_wraps, self.listener_failures
        ));
        if self.total_durations.total() > 0 {
            report.push_str(&format!(
                "Total duration: p50 {:.2?}, p99 {:.2?}\n",
                self.total_durations.p50(),
                self.total_durations.p99()
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = TrackerMetrics::new();
        metrics.record_operation_started();
        metrics.record_operation_started();
        metrics.record_operation_completed(Duration::from_millis(5), false);
        metrics.record_leg_scheduled();
        metrics.record_leg_aborted();
        metrics.record_legs_pruned(2);
        metrics.record_untracked_wrap();
        metrics.record_listener_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations_started, 2);
        assert_eq!(snapshot.operations_completed, 1);
        assert_eq!(snapshot.open_operations(), 1);
        assert_eq!(snapshot.failed_roots, 1);
        assert_eq!(snapshot.legs_scheduled, 1);
        assert_eq!(snapshot.legs_aborted, 1);
        assert_eq!(snapshot.legs_pruned, 2);
        assert_eq!(snapshot.untracked_wraps, 1);
        assert_eq!(snapshot.listener_failures, 1);
        assert_eq!(snapshot.total_durations.total(), 1);
    }

    #[test]
    fn test_histogram() {
        let mut hist = Histogram::default();

        hist.record(Duration::from_micros(500)); // bucket 0 (<=1ms)
        hist.record(Duration::from_millis(5)); // bucket 1 (<=10ms)
        hist.record(Duration::from_millis(50)); // bucket 2 (<=100ms)
        hist.record(Duration::from_secs(120)); // overflow

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[2], 1);
        assert_eq!(hist.counts()[hist.buckets().len()], 1);
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..100 {
            hist.record(Duration::from_millis(5));
        }

        assert_eq!(hist.p50(), Duration::from_millis(10));
        assert_eq!(hist.p99(), Duration::from_millis(10));
    }

    #[test]
    fn test_format_report() {
        let metrics = TrackerMetrics::new();
        metrics.record_operation_started();
        metrics.record_operation_completed(Duration::from_millis(3), true);

        let report = metrics.snapshot().format_report();
        assert!(report.contains("1 started, 1 completed, 0 open"));
        assert!(report.contains("p50"));
    }
}
