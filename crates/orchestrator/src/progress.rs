//! Progress tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free run counters.
///
/// `completed` is always bumped before `succeeded`, and snapshots read
/// `succeeded` first, so `succeeded <= completed <= total` holds for every
/// observer.
pub struct ProgressTracker {
    total: u64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total: total as u64,
            completed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Account for one finished target.
    pub fn finish_target(&self, succeeded: bool) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if succeeded {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let completed = self.completed.load(Ordering::SeqCst);
        ProgressSnapshot {
            total: self.total,
            completed,
            succeeded,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Counters plus derived rates at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn failed(&self) -> u64 {
        self.completed.saturating_sub(self.succeeded)
    }

    /// Completion percentage in [0.0, 100.0]; 0 when there is nothing to do.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Targets completed per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }

    /// Time left at the current rate; `None` while the rate is zero.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate();
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.completed) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(total: u64, completed: u64, succeeded: u64, secs: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            total,
            completed,
            succeeded,
            elapsed: Duration::from_secs(secs),
        }
    }

    #[test]
    fn counters_and_failed() {
        let tracker = ProgressTracker::new(3);
        tracker.finish_target(true);
        tracker.finish_target(false);
        let snap = tracker.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed(), 1);
    }

    #[test]
    fn full_completion_is_exactly_one_hundred() {
        assert_eq!(snapshot(7, 7, 3, 2).percent(), 100.0);
        assert_eq!(snapshot(3, 3, 0, 1).percent(), 100.0);
        assert_eq!(snapshot(0, 0, 0, 1).percent(), 0.0);
    }

    #[test]
    fn eta_is_none_without_throughput() {
        assert_eq!(snapshot(10, 0, 0, 5).eta(), None);
        assert_eq!(snapshot(10, 5, 0, 0).eta(), None);
        assert_eq!(snapshot(10, 5, 0, 5).eta(), Some(Duration::from_secs(5)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn succeeded_never_exceeds_completed() {
        let tracker = Arc::new(ProgressTracker::new(4000));
        let mut writers = Vec::new();
        for _ in 0..4 {
            let tracker = tracker.clone();
            writers.push(tokio::spawn(async move {
                for i in 0..1000 {
                    tracker.finish_target(i % 2 == 0);
                }
            }));
        }

        let reader = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                for _ in 0..10_000 {
                    let snap = tracker.snapshot();
                    assert!(snap.succeeded <= snap.completed);
                    assert!(snap.completed <= snap.total);
                }
            })
        };

        for w in writers {
            w.await.unwrap();
        }
        reader.await.unwrap();
        let snap = tracker.snapshot();
        assert_eq!(snap.completed, 4000);
        assert_eq!(snap.succeeded, 2000);
    }
}
