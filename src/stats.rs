//! Fetch latency histogram for one run. Values stored in milliseconds.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// Shared across item runners; every fetch attempt records its duration.
pub struct LatencyStats {
    inner: Mutex<Option<Histogram<u64>>>,
}

/// p50/p95/p99 in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Percentiles {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencyStats {
    /// Tracks 1ms to 1h, 3 significant figures.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Histogram::new_with_bounds(1, 3_600_000, 3).ok()),
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().clamp(1, 3_600_000) as u64;
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(h) = guard.as_mut() {
                let _ = h.record(ms);
            }
        }
    }

    /// None if no samples.
    pub fn percentiles(&self) -> Option<Percentiles> {
        let guard = self.inner.lock().ok()?;
        let h = guard.as_ref()?;
        if h.len() == 0 {
            return None;
        }
        Some(Percentiles {
            p50_ms: h.value_at_quantile(0.5),
            p95_ms: h.value_at_quantile(0.95),
            p99_ms: h.value_at_quantile(0.99),
            max_ms: h.max(),
        })
    }

    pub fn count(&self) -> u64 {
        self.inner
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|h| h.len()))
            .unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert_eq!(stats.percentiles(), None);
        assert_eq!(stats.count(), 0);
    }

    #[test]
    fn percentiles_follow_samples() {
        let stats = LatencyStats::new();
        for ms in 1..=100 {
            stats.record(Duration::from_millis(ms));
        }
        let p = stats.percentiles().unwrap();
        assert_eq!(stats.count(), 100);
        assert_eq!(p.p50_ms, 50);
        assert_eq!(p.p99_ms, 99);
        assert_eq!(p.max_ms, 100);
    }

    #[test]
    fn sub_millisecond_fetches_count_as_one_ms() {
        let stats = LatencyStats::new();
        stats.record(Duration::from_micros(10));
        assert_eq!(stats.percentiles().unwrap().p50_ms, 1);
    }
}
