//! Duration metrics for the materialization pipeline
//!
//! Two histograms are recorded, one around each blocking stage: download
//! seconds and conversion seconds. Buckets follow the operational profile of
//! dataset materialization, from one second to two hours plus an unbounded
//! overflow bucket. Recording is lock-free so producers on any runtime
//! thread can observe without contention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Histogram bucket upper bounds, in seconds
pub const DURATION_BUCKETS: [f64; 9] = [
    1.0, 10.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
];

/// Lock-free duration histogram with fixed buckets
///
/// Counts land in the first bucket whose bound is not exceeded; observations
/// beyond the last bound land in the overflow bucket.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    buckets: [AtomicU64; DURATION_BUCKETS.len() + 1],
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl DurationHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation
    pub fn observe(&self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        let index = DURATION_BUCKETS
            .iter()
            .position(|bound| seconds <= *bound)
            .unwrap_or(DURATION_BUCKETS.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// A consistent-enough copy of the current counters
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            count: self.count.load(Ordering::Relaxed),
            sum: Duration::from_micros(self.sum_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of a histogram's counters
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramSnapshot {
    /// Per-bucket counts; the last entry is the unbounded overflow bucket
    pub buckets: Vec<u64>,
    /// Total number of observations
    pub count: u64,
    /// Sum of all observed durations
    pub sum: Duration,
}

/// Duration metrics recorded by the materialization pipeline
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    download_seconds: DurationHistogram,
    convert_seconds: DurationHistogram,
}

impl PipelineMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record time spent downloading during materialization
    pub fn record_download(&self, elapsed: Duration) {
        self.download_seconds.observe(elapsed);
    }

    /// Record time spent converting during materialization
    pub fn record_convert(&self, elapsed: Duration) {
        self.convert_seconds.observe(elapsed);
    }

    /// Snapshot of the download histogram
    pub fn download_seconds(&self) -> HistogramSnapshot {
        self.download_seconds.snapshot()
    }

    /// Snapshot of the conversion histogram
    pub fn convert_seconds(&self) -> HistogramSnapshot {
        self.convert_seconds.snapshot()
    }
}
