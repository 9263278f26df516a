//! Lock-free request counters and a rolling-average latency estimate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Updated with atomic read-modify-write only; the latency EMA uses a
/// compare-and-swap loop so no lock is taken on the hot path.
#[derive(Debug, Default)]
pub struct Stats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    /// Latency EMA stored as whole microseconds in the low bits of an
    /// f64 bit pattern, updated via compare-and-swap.
    avg_latency_micros_bits: AtomicU64,
    healthy: AtomicBool,
}

impl Stats {
    pub fn new() -> Self {
        let s = Self::default();
        s.healthy.store(true, Ordering::Relaxed);
        s
    }

    pub fn record_success(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.update_latency(latency);
        self.update_health();
    }

    pub fn record_failure(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.update_latency(latency);
        self.update_health();
    }

    fn update_latency(&self, sample: Duration) {
        let sample_micros = sample.as_micros() as f64;
        loop {
            let current_bits = self.avg_latency_micros_bits.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let updated = if current == 0.0 {
                sample_micros
            } else {
                (current * 9.0 + sample_micros) / 10.0
            };
            let updated_bits = updated.to_bits();
            if self
                .avg_latency_micros_bits
                .compare_exchange_weak(
                    current_bits,
                    updated_bits,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }
    }

    fn update_health(&self) {
        let total = self.requests.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let healthy = total == 0 || (failures as f64 / total as f64) < 0.10;
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn avg_latency(&self) -> Duration {
        let bits = self.avg_latency_micros_bits.load(Ordering::Relaxed);
        Duration::from_micros(f64::from_bits(bits).round() as u64)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_requests_separately() {
        let stats = Stats::new();
        stats.record_success(Duration::from_millis(10));
        stats.record_failure(Duration::from_millis(20));
        assert_eq!(stats.requests(), 2);
        assert_eq!(stats.successes(), 1);
        assert_eq!(stats.failures(), 1);
    }

    #[test]
    fn latency_ema_converges_toward_samples() {
        let stats = Stats::new();
        for _ in 0..50 {
            stats.record_success(Duration::from_millis(100));
        }
        let avg = stats.avg_latency();
        assert!(avg.as_millis() >= 95 && avg.as_millis() <= 105);
    }

    #[test]
    fn health_flips_false_above_ten_percent_failure_rate() {
        let stats = Stats::new();
        for _ in 0..9 {
            stats.record_success(Duration::from_millis(1));
        }
        assert!(stats.is_healthy());
        stats.record_failure(Duration::from_millis(1));
        stats.record_failure(Duration::from_millis(1));
        assert!(!stats.is_healthy());
    }

    #[test]
    fn fresh_stats_start_healthy() {
        let stats = Stats::new();
        assert!(stats.is_healthy());
    }
}
