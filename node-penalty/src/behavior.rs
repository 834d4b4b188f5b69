//! Per-node misbehaviour statistics.
//!
//! Stats live on the node's account record and are lazily initialized on the
//! first violation. They drive three things:
//!
//! - **Rate limiting**: the minimum spacing between two violations of the
//!   same class grows with the number already recorded, capped at one hour.
//! - **Oscillation detection**: a refute shortly after a lost report is a
//!   connectivity flip; three lost/refute flips inside one unbroken run
//!   count as one oscillation.
//! - **Removal**: independent thresholds on oscillations, lost reports and
//!   the length of the current unstable run.
//!
//! An unstable run is a sequence of lost and refute events, each arriving
//! within [`OSCILLATION_WINDOW_MS`] of the one before it
//! (`consecutive_lost_refutes` is its length). A refute that is not a flip,
//! or a lost report after a quiet hour, starts a new run.

use {
    crate::{
        error::{PenaltyError, Result},
        types::{BehaviorStats, NodeAccount, ViolationType},
    },
    log::trace,
};

/// Base spacing between two violations of the same class (5 minutes).
pub const RATE_LIMIT_BASE_MS: u64 = 300_000;
/// Upper bound on the rate-limit window (1 hour).
pub const RATE_LIMIT_CAP_MS: u64 = 3_600_000;
/// A refute this soon after a lost report counts as a flip.
pub const OSCILLATION_WINDOW_MS: u64 = 3_600_000;
/// Flips folded into one oscillation.
pub const FLIPS_PER_OSCILLATION: u32 = 3;
/// Run length at which a run of alternating lost/refute events completes
/// one oscillation.
const EVENTS_PER_OSCILLATION: u32 = FLIPS_PER_OSCILLATION.saturating_mul(2);

pub const REMOVAL_OSCILLATION_THRESHOLD: u32 = 5;
pub const REMOVAL_LOST_THRESHOLD: u32 = 10;
pub const REMOVAL_CONSECUTIVE_FLIP_THRESHOLD: u32 = 9;

/// Why a node crossed the removal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalTrigger {
    /// Connectivity keeps flapping.
    Oscillation(u32),
    /// Persistent drop-outs.
    PersistentLoss(u32),
    /// Sustained lost/refute instability.
    Instability(u32),
}

impl std::fmt::Display for RemovalTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalTrigger::Oscillation(n) => write!(f, "oscillation count {n}"),
            RemovalTrigger::PersistentLoss(n) => write!(f, "lost count {n}"),
            RemovalTrigger::Instability(n) => write!(f, "consecutive lost/refutes {n}"),
        }
    }
}

/// Stateless operations over the `behavior_stats` of a [`NodeAccount`].
pub struct BehaviorTracker;

impl BehaviorTracker {
    /// Zeroed stats on first use; existing stats are returned untouched.
    pub fn init(node: &mut NodeAccount) -> &mut BehaviorStats {
        node.behavior_stats.get_or_insert_with(BehaviorStats::default)
    }

    /// Minimum spacing after `prior_count` violations of one class.
    pub fn min_spacing_ms(prior_count: u32) -> u64 {
        RATE_LIMIT_BASE_MS
            .saturating_mul(u64::from(prior_count).saturating_add(1))
            .min(RATE_LIMIT_CAP_MS)
    }

    /// Returns the earliest allowed timestamp if a violation of
    /// `violation_type` at `tx_timestamp` falls inside the rate-limit window.
    pub fn is_rate_limited(
        stats: Option<&BehaviorStats>,
        violation_type: ViolationType,
        tx_timestamp: u64,
    ) -> Option<u64> {
        let stats = stats?;
        let (count, last) = if violation_type.is_lost_class() {
            (stats.lost_count, stats.last_lost_time)
        } else {
            (stats.refute_count, stats.last_refute_time)
        };
        if count == 0 {
            return None;
        }
        let window = Self::min_spacing_ms(count);
        (tx_timestamp.saturating_sub(last) < window).then(|| last.saturating_add(window))
    }

    /// Fold one violation into the node's stats.
    pub fn record_violation(
        node: &mut NodeAccount,
        violation_type: ViolationType,
        tx_timestamp: u64,
    ) -> Result<()> {
        let stats = Self::init(node);
        match violation_type {
            ViolationType::LeftNetworkEarly | ViolationType::SyncingTooLong => {
                let previous = stats.last_lost_time.max(stats.last_refute_time);
                let in_run = previous > 0
                    && tx_timestamp.saturating_sub(previous) < OSCILLATION_WINDOW_MS;
                stats.consecutive_lost_refutes = if in_run {
                    stats.consecutive_lost_refutes.saturating_add(1)
                } else {
                    1
                };
                stats.lost_count = stats.lost_count.saturating_add(1);
                stats.last_lost_time = tx_timestamp;
            }
            ViolationType::NodeRefuted => {
                stats.refute_count = stats.refute_count.saturating_add(1);
                stats.last_refute_time = tx_timestamp;
                let is_flip = stats.last_lost_time > 0
                    && tx_timestamp.saturating_sub(stats.last_lost_time) < OSCILLATION_WINDOW_MS;
                if is_flip {
                    stats.consecutive_lost_refutes = stats.consecutive_lost_refutes.saturating_add(1);
                    if stats.consecutive_lost_refutes % EVENTS_PER_OSCILLATION == 0 {
                        stats.oscillation_count = stats.oscillation_count.saturating_add(1);
                        stats.last_oscillation_time = tx_timestamp;
                    }
                } else {
                    stats.consecutive_lost_refutes = 1;
                }
            }
            ViolationType::DoubleVote => {
                return Err(PenaltyError::UnsupportedViolation(violation_type));
            }
        }
        trace!("behaviour stats for {}: {:?}", node.id, node.behavior_stats);
        Ok(())
    }

    /// First removal threshold the stats cross, if any.
    pub fn removal_trigger(stats: Option<&BehaviorStats>) -> Option<RemovalTrigger> {
        let stats = stats?;
        if stats.oscillation_count >= REMOVAL_OSCILLATION_THRESHOLD {
            Some(RemovalTrigger::Oscillation(stats.oscillation_count))
        } else if stats.lost_count >= REMOVAL_LOST_THRESHOLD {
            Some(RemovalTrigger::PersistentLoss(stats.lost_count))
        } else if stats.consecutive_lost_refutes >= REMOVAL_CONSECUTIVE_FLIP_THRESHOLD {
            Some(RemovalTrigger::Instability(stats.consecutive_lost_refutes))
        } else {
            None
        }
    }

    pub fn should_remove_node(stats: Option<&BehaviorStats>) -> bool {
        Self::removal_trigger(stats).is_some()
    }
}
