//! Run-wide success/failure accounting

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Thread-safe accumulator shared by all workers.
///
/// Every update is a single atomic increment; read it through
/// [`snapshot`](Stats::snapshot) once the workers have joined.
#[derive(Debug, Default)]
pub struct Stats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    downloaded: AtomicUsize,
    bytes: AtomicU64,
    already_present: AtomicUsize,
    no_match: AtomicUsize,
}

/// Plain copy of [`Stats`] taken after the join barrier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub succeeded: usize,
    pub failed: usize,
    pub downloaded: usize,
    pub bytes: u64,
    pub already_present: usize,
    pub no_match: usize,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Item given up on after its last attempt
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download(&self, bytes: u64) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_already_present(&self) {
        self.already_present.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_match(&self) {
        self.no_match.fetch_add(1, Ordering::Relaxed);
    }

    /// Items settled either way so far (progress display only)
    pub fn resolved(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            downloaded: self.downloaded.load(Ordering::SeqCst),
            bytes: self.bytes.load(Ordering::SeqCst),
            already_present: self.already_present.load(Ordering::SeqCst),
            no_match: self.no_match.load(Ordering::SeqCst),
        }
    }
}

impl StatsSnapshot {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let stats = Stats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.resolved(), 0);
    }

    #[test]
    fn concurrent_increments_all_counted() {
        let stats = Stats::new();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        stats.record_success();
                        stats.record_download(10);
                    }
                    stats.record_failure();
                });
            }
        });
        let snap = stats.snapshot();
        assert_eq!(snap.succeeded, 8000);
        assert_eq!(snap.failed, 8);
        assert_eq!(snap.downloaded, 8000);
        assert_eq!(snap.bytes, 80_000);
        assert_eq!(snap.total(), 8008);
    }

    #[test]
    fn detail_counters_independent_of_outcome() {
        let stats = Stats::new();
        stats.record_already_present();
        stats.record_no_match();
        stats.record_no_match();
        let snap = stats.snapshot();
        assert_eq!(snap.already_present, 1);
        assert_eq!(snap.no_match, 2);
        assert_eq!(snap.succeeded, 0);
    }
}
