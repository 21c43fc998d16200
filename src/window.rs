// Bounded rolling window of (timestamp, bytes) samples for bandwidth estimation.

use std::collections::VecDeque;

/// Max samples kept in the bandwidth window.
pub const BANDWIDTH_SAMPLE_CAP: usize = 300;

/// Trailing window width for the bandwidth estimate.
pub const BANDWIDTH_WINDOW_MS: u64 = 10_000;

/// FIFO of samples, oldest at the front. Timestamps are the wall clock at
/// ingest (ms since Unix epoch), not packet capture times, and never decrease
/// from front to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingWindow {
    samples: VecDeque<(u64, u64)>,
    cap: usize,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::with_capacity(BANDWIDTH_SAMPLE_CAP)
    }
}

impl RollingWindow {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Appends a sample, evicting the oldest one when full. A timestamp older than
    /// the newest sample is clamped up to it so the window stays ordered.
    pub fn append(&mut self, timestamp: u64, size: u64) {
        if self.cap == 0 {
            return;
        }
        let timestamp = match self.samples.back() {
            Some(&(newest, _)) => timestamp.max(newest),
            None => timestamp,
        };
        if self.samples.len() >= self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back((timestamp, size));
    }

    /// Sum of sizes with `timestamp >= cutoff`, scanning from the newest end.
    /// Saturates at `u64::MAX`.
    pub fn sum_since(&self, cutoff: u64) -> u64 {
        self.samples
            .iter()
            .rev()
            .take_while(|(ts, _)| *ts >= cutoff)
            .fold(0u64, |acc, (_, size)| acc.saturating_add(*size))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Bytes/sec over the trailing window ending at `now`.
    ///
    /// The divisor is `min(window, now - session_start)`, so a session younger than
    /// the window is not under-reported. Zero without a session or when no time has
    /// elapsed yet.
    pub fn bandwidth(&self, now: u64, session_start: Option<u64>) -> f64 {
        let Some(start) = session_start else {
            return 0.0;
        };
        if now <= start {
            return 0.0;
        }
        let elapsed_ms = (now - start).min(BANDWIDTH_WINDOW_MS);
        let total = self.sum_since(now.saturating_sub(BANDWIDTH_WINDOW_MS));
        total as f64 / (elapsed_ms as f64 / 1000.0)
    }
}
