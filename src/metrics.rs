//! Passive counters for pool observability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::RwLock;

/// Pool-wide execution counters plus a task-latency histogram.
///
/// Counters are updated with relaxed atomics; the histogram is written with
/// `try_write` so a contended snapshot reader never stalls a worker.
#[derive(Debug)]
pub struct PoolMetrics {
    tasks_submitted: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_panicked: AtomicU64,
    submissions_rejected: AtomicU64,

    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl PoolMetrics {
    pub(crate) fn new() -> Self {
        // 3 significant figures, values up to one hour in nanoseconds.
        let histogram =
            Histogram::new_with_max(3_600_000_000_000, 3).expect("failed to create histogram");

        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_submission(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.submissions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_task_execution(&self, duration_ns: u64) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);

        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(duration_ns);
        }
    }

    pub(crate) fn record_task_panic(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of tasks accepted by submit.
    pub fn tasks_submitted(&self) -> u64 {
        self.tasks_submitted.load(Ordering::Relaxed)
    }

    /// Number of envelopes a worker has finished running.
    pub fn tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    /// Number of executed tasks whose callable panicked.
    pub fn tasks_panicked(&self) -> u64 {
        self.tasks_panicked.load(Ordering::Relaxed)
    }

    /// Number of submissions rejected because the queue was full.
    pub fn submissions_rejected(&self) -> u64 {
        self.submissions_rejected.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter plus latency percentiles.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let hist = self.latency_histogram.read();

        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted(),
            tasks_executed: self.tasks_executed(),
            tasks_panicked: self.tasks_panicked(),
            submissions_rejected: self.submissions_rejected(),
            latency_p50_ns: hist.value_at_quantile(0.50),
            latency_p99_ns: hist.value_at_quantile(0.99),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

/// One coherent reading of [`PoolMetrics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Tasks accepted by submit.
    pub tasks_submitted: u64,
    /// Envelopes finished by workers.
    pub tasks_executed: u64,
    /// Executed tasks whose callable panicked.
    pub tasks_panicked: u64,
    /// Submissions rejected on a full queue.
    pub submissions_rejected: u64,
    /// Median task execution latency in nanoseconds.
    pub latency_p50_ns: u64,
    /// 99th-percentile task execution latency in nanoseconds.
    pub latency_p99_ns: u64,
    /// Seconds since the metrics were created.
    pub uptime_secs: f64,
}
