//! Run progress counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// Default number of settled tiles between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

/// Lock-free counters shared by all render tasks.
///
/// `written` is incremented exactly once per tile stored in the archive.
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    interval: u64,
    written: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: u64, interval: u64) -> Self {
        Self {
            total,
            interval: interval.max(1),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Records a tile stored in the archive.
    pub fn record_written(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.written.fetch_add(1, Ordering::AcqRel);
        self.maybe_log();
    }

    /// Records a tile that failed to render.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
        self.maybe_log();
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    fn maybe_log(&self) {
        let settled = self.written() + self.failed();
        if settled % self.interval != 0 && settled != self.total {
            return;
        }

        let elapsed = self.started.elapsed();
        let rate = settled as f64 / elapsed.as_secs_f64().max(0.001);
        let percent = if self.total == 0 {
            100.0
        } else {
            settled as f64 * 100.0 / self.total as f64
        };
        info!(
            settled,
            total = self.total,
            failed = self.failed(),
            percent = %format!("{:.1}", percent),
            tiles_per_sec = %format!("{:.1}", rate),
            "Progress"
        );
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> RunStats {
        RunStats {
            planned: self.total,
            written: self.written(),
            failed: self.failed(),
            bytes_written: self.bytes.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Summary counters of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunStats {
    pub planned: u64,
    pub written: u64,
    pub failed: u64,
    pub bytes_written: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunStats {
    /// Tiles planned but neither written nor failed (cancelled runs).
    pub fn skipped(&self) -> u64 {
        self.planned.saturating_sub(self.written + self.failed)
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let tracker = ProgressTracker::new(4, 2);
        tracker.record_written(10);
        tracker.record_written(5);
        tracker.record_failed();

        let stats = tracker.snapshot();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.bytes_written, 15);
        assert_eq!(stats.skipped(), 1);
    }

    #[test]
    fn test_concurrent_increments_are_exact() {
        let tracker = std::sync::Arc::new(ProgressTracker::new(8000, 1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.record_written(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.written(), 8000);
    }
}
