//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared by the scheduler, workers and producer handles
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Documents accepted into the queue
    submitted: AtomicU64,
    /// Non-blocking submissions rejected on a full queue
    rejected: AtomicU64,
    /// Documents released to a worker by the pacer
    released: AtomicU64,
    /// Successful deliveries
    delivered: AtomicU64,
    /// Failed delivery attempts
    failed: AtomicU64,
    /// Failed documents put back into the queue
    requeued: AtomicU64,
    /// Queued documents dropped on shutdown or lost after a failure
    discarded: AtomicU64,
    /// Deliveries currently running
    in_flight: AtomicUsize,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn inc_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requeued(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }

    pub fn inc_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn add_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Mark a delivery as started
    pub fn start_delivery(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a delivery as finished
    pub fn finish_delivery(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self, queue_len: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len,
            submitted: self.submitted(),
            rejected: self.rejected(),
            released: self.released(),
            delivered: self.delivered(),
            failed: self.failed(),
            requeued: self.requeued(),
            discarded: self.discarded(),
            in_flight: self.in_flight(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub submitted: u64,
    pub rejected: u64,
    pub released: u64,
    pub delivered: u64,
    pub failed: u64,
    pub requeued: u64,
    pub discarded: u64,
    pub in_flight: usize,
}
