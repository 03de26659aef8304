//! Byte throughput tracking for archive sessions
//!
//! Tracks the total number of bytes written across all transfers and the
//! recent byte rate over a sliding window, optionally mirrored on a progress
//! bar. The transfer budget is advisory: it sizes the bar and nothing else.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Width of the window the recent byte rate is computed over
const RATE_WINDOW: Duration = Duration::from_secs(10);

/// Progress watcher for one archive session
pub struct ProgressWatcher {
    /// Advisory number of bytes expected (0 when unknown)
    bytes_to_transfer: u64,
    /// Bytes written so far
    total: AtomicU64,
    /// Creation time of the watcher
    start_time: Instant,
    /// Recent (timestamp, bytes) samples inside the rate window
    samples: Mutex<VecDeque<(Instant, u64)>>,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressWatcher {
    /// Create a new progress watcher
    ///
    /// # Arguments
    /// * `bytes_to_transfer` - Expected transfer size if known (0 for unknown)
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(bytes_to_transfer: u64, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let bar = if bytes_to_transfer > 0 {
                let bar = ProgressBar::new(bytes_to_transfer);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            } else {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{spinner:.green} {bytes} {msg}")
                {
                    bar.set_style(style);
                }
                bar
            };
            Some(bar)
        } else {
            None
        };

        Self {
            bytes_to_transfer,
            total: AtomicU64::new(0),
            start_time: Instant::now(),
            samples: Mutex::new(VecDeque::new()),
            bar,
        }
    }

    /// Watcher without a bar and without a budget
    pub fn silent() -> Self {
        Self::new(0, false)
    }

    /// Record a completed transfer of `bytes`
    pub fn record(&self, bytes: u64) {
        let total = self.total.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let now = Instant::now();

        if let Ok(mut samples) = self.samples.lock() {
            samples.push_back((now, bytes));
            while let Some((at, _)) = samples.front() {
                if now.duration_since(*at) > RATE_WINDOW {
                    samples.pop_front();
                } else {
                    break;
                }
            }
        }

        if let Some(ref bar) = self.bar {
            bar.set_position(total);
            bar.set_message(format!("({:.0} B/s)", self.recent_byte_rate()));
        }
    }

    /// Advisory transfer budget
    pub fn bytes_to_transfer(&self) -> u64 {
        self.bytes_to_transfer
    }

    /// Total bytes across all transfers so far
    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Bytes per second over the recent window
    pub fn recent_byte_rate(&self) -> f64 {
        let now = Instant::now();
        let window_start = self
            .start_time
            .max(now.checked_sub(RATE_WINDOW).unwrap_or(self.start_time));
        let bytes: u64 = match self.samples.lock() {
            Ok(samples) => samples
                .iter()
                .filter(|(at, _)| *at >= window_start)
                .map(|(_, b)| *b)
                .sum(),
            Err(_) => return 0.0,
        };
        let elapsed = now.duration_since(window_start).as_secs_f64();
        if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_accumulate() {
        let watcher = ProgressWatcher::new(1000, false);
        watcher.record(100);
        watcher.record(250);
        assert_eq!(watcher.total_bytes(), 350);
        assert_eq!(watcher.bytes_to_transfer(), 1000);
    }

    #[test]
    fn test_recent_rate_positive_after_transfer() {
        let watcher = ProgressWatcher::silent();
        assert_eq!(watcher.recent_byte_rate(), 0.0);
        std::thread::sleep(Duration::from_millis(5));
        watcher.record(4096);
        assert!(watcher.recent_byte_rate() > 0.0);
    }

    #[test]
    fn test_with_bar_enabled() {
        let watcher = ProgressWatcher::new(0, true);
        watcher.record(10);
        watcher.finish();
        assert_eq!(watcher.total_bytes(), 10);
    }
}
