//! Counters for the penalty subsystem.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
    name: &'static str,
}

impl Counter {
    pub const fn new(name: &'static str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name,
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Event counters shared by the builder, validator and apply pipeline.
#[derive(Debug)]
pub struct PenaltyMetrics {
    pub injected: Counter,
    pub injection_skipped: Counter,
    pub validation_failures: Counter,
    pub applied: Counter,
    pub rate_limited: Counter,
    pub already_processed: Counter,
    pub removals: Counter,
    pub quorum_failures: Counter,
    pub cache_evictions: Counter,
}

impl Default for PenaltyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PenaltyMetrics {
    pub const fn new() -> Self {
        Self {
            injected: Counter::new("penalty_tx_injected"),
            injection_skipped: Counter::new("penalty_tx_injection_skipped"),
            validation_failures: Counter::new("penalty_tx_validation_failures"),
            applied: Counter::new("penalty_tx_applied"),
            rate_limited: Counter::new("penalty_tx_rate_limited"),
            already_processed: Counter::new("penalty_tx_already_processed"),
            removals: Counter::new("penalty_node_removals"),
            quorum_failures: Counter::new("penalty_removal_quorum_failures"),
            cache_evictions: Counter::new("penalty_tx_cache_evictions"),
        }
    }

    pub fn snapshot(&self) -> PenaltyMetricsSnapshot {
        PenaltyMetricsSnapshot {
            injected: self.injected.get(),
            injection_skipped: self.injection_skipped.get(),
            validation_failures: self.validation_failures.get(),
            applied: self.applied.get(),
            rate_limited: self.rate_limited.get(),
            already_processed: self.already_processed.get(),
            removals: self.removals.get(),
            quorum_failures: self.quorum_failures.get(),
            cache_evictions: self.cache_evictions.get(),
        }
    }
}

/// Point-in-time copy of [`PenaltyMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PenaltyMetricsSnapshot {
    pub injected: u64,
    pub injection_skipped: u64,
    pub validation_failures: u64,
    pub applied: u64,
    pub rate_limited: u64,
    pub already_processed: u64,
    pub removals: u64,
    pub quorum_failures: u64,
    pub cache_evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::new("test_total");
        assert_eq!(c.get(), 0);
        c.inc();
        c.add(4);
        assert_eq!(c.get(), 5);
        assert_eq!(c.name(), "test_total");
    }

    #[test]
    fn test_snapshot() {
        let metrics = PenaltyMetrics::new();
        metrics.applied.inc();
        metrics.cache_evictions.add(3);
        let snap = metrics.snapshot();
        assert_eq!(snap.applied, 1);
        assert_eq!(snap.cache_evictions, 3);
        assert_eq!(snap.removals, 0);
    }
}
