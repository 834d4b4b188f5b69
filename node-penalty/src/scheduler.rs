//! Re-armable timer for periodic maintenance.
//!
//! The timer keeps its schedule aligned to a fixed grid: when a run starts
//! late, the next delay is shortened by the observed drift so the following
//! run lands back on the expected fire time.
//!
//! ```text
//! armed        expected        expected_2
//! |  interval  |   interval    |
//! |------------|-------|-------|
//!              | drift | delay |
//!                      ^ actual fire; next delay = interval - drift
//! ```

use std::time::Duration;

/// Shortest delay ever scheduled, so a badly late run cannot spin.
pub const MIN_RESCHEDULE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionTimer {
    interval_ms: u64,
    expected_next_fire_ms: u64,
    drift_correction_ms: u64,
}

impl EvictionTimer {
    /// Arm a timer that first fires one interval after `now_ms`.
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            expected_next_fire_ms: now_ms.saturating_add(interval_ms),
            drift_correction_ms: 0,
        }
    }

    /// The configured interval, never shorter than [`MIN_RESCHEDULE_MS`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_RESCHEDULE_MS))
    }

    pub fn expected_next_fire_ms(&self) -> u64 {
        self.expected_next_fire_ms
    }

    /// Lateness of the most recent run.
    pub fn drift_correction_ms(&self) -> u64 {
        self.drift_correction_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.expected_next_fire_ms
    }

    /// Time left until the next expected fire.
    pub fn delay_until_next(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.expected_next_fire_ms.saturating_sub(now_ms))
    }

    /// Record a run that started at `fired_at_ms` and schedule the next one.
    /// Returns the delay to wait before the next run.
    pub fn rearm(&mut self, fired_at_ms: u64) -> Duration {
        let drift = fired_at_ms.saturating_sub(self.expected_next_fire_ms);
        if drift >= self.interval_ms {
            // missed whole intervals; restart the grid from now
            self.expected_next_fire_ms = fired_at_ms.saturating_add(self.interval_ms);
            self.drift_correction_ms = 0;
            return self.interval();
        }
        self.drift_correction_ms = drift;
        self.expected_next_fire_ms = self.expected_next_fire_ms.saturating_add(self.interval_ms);
        Duration::from_millis(self.interval_ms.saturating_sub(drift).max(MIN_RESCHEDULE_MS))
    }
}
