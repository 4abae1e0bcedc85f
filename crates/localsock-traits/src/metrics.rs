//! Endpoint metrics types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of an endpoint's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMetricsSnapshot {
    /// Connections accepted and delivered.
    pub accepted: u64,

    /// Accept attempts that failed and were reported.
    pub accept_failures: u64,

    /// Loop cycles skipped because the registry was over the backlog.
    pub throttled: u64,

    /// Backoff sleeps taken by the accept loop.
    pub backoffs: u64,

    /// Successful client connects.
    pub connects: u64,

    /// Failed client connects.
    pub failed_connects: u64,
}

/// Lock-free counters updated by the endpoint and its accept loop.
#[derive(Debug, Default)]
pub struct EndpointMetrics {
    /// Connections accepted and delivered (atomic counter).
    pub accepted: AtomicU64,

    /// Reported accept failures (atomic counter).
    pub accept_failures: AtomicU64,

    /// Throttled loop cycles (atomic counter).
    pub throttled: AtomicU64,

    /// Backoff sleeps (atomic counter).
    pub backoffs: AtomicU64,

    /// Successful client connects (atomic counter).
    pub connects: AtomicU64,

    /// Failed client connects (atomic counter).
    pub failed_connects: AtomicU64,
}

impl EndpointMetrics {
    /// Creates a new `EndpointMetrics` instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments one counter.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Creates a serializable snapshot from the current atomic values.
    pub fn snapshot(&self) -> EndpointMetricsSnapshot {
        EndpointMetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            accept_failures: self.accept_failures.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            backoffs: self.backoffs.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            failed_connects: self.failed_connects.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.accepted.store(0, Ordering::Relaxed);
        self.accept_failures.store(0, Ordering::Relaxed);
        self.throttled.store(0, Ordering::Relaxed);
        self.backoffs.store(0, Ordering::Relaxed);
        self.connects.store(0, Ordering::Relaxed);
        self.failed_connects.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default() {
        let metrics = EndpointMetrics::new();
        assert_eq!(metrics.snapshot(), EndpointMetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_update_and_reset() {
        let metrics = EndpointMetrics::new();
        EndpointMetrics::incr(&metrics.accepted);
        EndpointMetrics::incr(&metrics.accepted);
        EndpointMetrics::incr(&metrics.backoffs);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.backoffs, 1);
        assert_eq!(snapshot.accept_failures, 0);

        metrics.reset();
        assert_eq!(metrics.snapshot().accepted, 0);
    }
}
