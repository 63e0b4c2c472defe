//! Interval-based progress logging.
//!
//! A [`ProgressTracker`] keeps an atomic count of processed items and emits an `info!` line
//! every time the count passes a multiple of its interval.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of items between progress messages.
pub const DEFAULT_INTERVAL: u64 = 1_000_000;

/// Thread-safe counter that logs at fixed intervals.
///
/// ```
/// use fgmerge_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Merged records").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Merged records 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with a count of zero and the default interval.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: DEFAULT_INTERVAL, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the number of items between messages; zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` items, logging once per interval boundary passed.
    ///
    /// Returns `true` when the count after the update sits exactly on a boundary, in which case
    /// the last boundary message already reported it.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        let before = self.count.fetch_add(additional, Ordering::Relaxed);
        let after = before + additional;

        for boundary in (before / self.interval + 1)..=(after / self.interval) {
            info!("{} {}", self.message, boundary * self.interval);
        }

        after > 0 && after.is_multiple_of(self.interval)
    }

    /// Logs the final count unless it was already reported on a boundary.
    pub fn log_final(&self) {
        let count = self.count();
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, count);
        }
    }

    /// The number of items counted so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
