//! Tracing setup and run counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "tonebox=info";

/// Install the global subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Counters for provisioning activity
#[derive(Debug, Default)]
pub struct Metrics {
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    assignments_succeeded: AtomicU64,
    assignments_failed: AtomicU64,
    bytes_downloaded: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "runs_started", "Metric incremented");
    }

    pub fn run_succeeded(&self) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "runs_succeeded", "Metric incremented");
    }

    pub fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "runs_failed", "Metric incremented");
    }

    /// Record the final per-identifier tally of a run
    pub fn assignments(&self, succeeded: u64, failed: u64) {
        self.assignments_succeeded
            .fetch_add(succeeded, Ordering::Relaxed);
        self.assignments_failed.fetch_add(failed, Ordering::Relaxed);
        tracing::debug!(succeeded, failed, "Assignment metrics recorded");
    }

    pub fn bytes_downloaded(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        tracing::debug!(counter = "bytes_downloaded", bytes, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            assignments_succeeded: self.assignments_succeeded.load(Ordering::Relaxed),
            assignments_failed: self.assignments_failed.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub assignments_succeeded: u64,
    pub assignments_failed: u64,
    pub bytes_downloaded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let metrics = Metrics::new();
        metrics.run_started();
        metrics.run_failed();
        metrics.assignments(2, 1);
        metrics.bytes_downloaded(512);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_started, 1);
        assert_eq!(snapshot.runs_failed, 1);
        assert_eq!(snapshot.runs_succeeded, 0);
        assert_eq!(snapshot.assignments_succeeded, 2);
        assert_eq!(snapshot.assignments_failed, 1);
        assert_eq!(snapshot.bytes_downloaded, 512);
    }
}
