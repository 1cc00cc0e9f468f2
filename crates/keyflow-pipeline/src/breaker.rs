//! Failure-rate circuit breaker
//!
//! Tracks observations for the current stage and reports when the
//! rolling failure rate crosses the configured threshold. The runner
//! checks it before each dispatch; the orchestrator resets it at every
//! stage boundary.

use std::sync::atomic::{AtomicU32, Ordering};

/// Rolling failure-rate monitor for one stage at a time.
#[derive(Debug)]
pub struct HealthMonitor {
    failures: AtomicU32,
    total: AtomicU32,
    threshold: f64,
    min_samples: u32,
}

impl HealthMonitor {
    /// `threshold` is the failure fraction (0.0 - 1.0) that trips the
    /// breaker once at least `min_samples` observations were made.
    pub fn new(threshold: f64, min_samples: u32) -> Self {
        Self {
            failures: AtomicU32::new(0),
            total: AtomicU32::new(0),
            threshold,
            min_samples,
        }
    }

    /// Record one completed task.
    pub fn observe(&self, success: bool) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if !success {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Whether dispatch should stop.
    pub fn should_halt(&self) -> bool {
        let total = self.total.load(Ordering::SeqCst);
        if total < self.min_samples {
            return false;
        }
        let failures = self.failures.load(Ordering::SeqCst);
        f64::from(failures) / f64::from(total) > self.threshold
    }

    /// Current failure rate (0.0 when nothing was observed).
    pub fn failure_rate(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        f64::from(self.failures.load(Ordering::SeqCst)) / f64::from(total)
    }

    /// Clear the counters at a stage boundary.
    pub fn reset(&self) {
        self.failures.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trip_below_min_samples() {
        let monitor = HealthMonitor::new(0.3, 10);
        for _ in 0..9 {
            monitor.observe(false);
        }
        // 100% failure rate, but under the sample floor
        assert!(!monitor.should_halt());

        monitor.observe(false);
        assert!(monitor.should_halt());
    }

    #[test]
    fn test_trips_above_threshold_only() {
        let monitor = HealthMonitor::new(0.3, 10);
        for i in 0..20 {
            monitor.observe(i % 4 != 0); // 25% failures
        }
        assert!(!monitor.should_halt());

        for _ in 0..10 {
            monitor.observe(false);
        }
        assert!(monitor.should_halt());
    }

    #[test]
    fn test_reset_clears_state() {
        let monitor = HealthMonitor::new(0.3, 10);
        for _ in 0..15 {
            monitor.observe(false);
        }
        assert!(monitor.should_halt());

        monitor.reset();
        assert!(!monitor.should_halt());
        assert_eq!(monitor.failure_rate(), 0.0);
    }
}
