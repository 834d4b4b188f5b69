//! Penalty amounts.
//!
//! `penalty = floor(base(violation, stake_lock) * multiplier(stats))`,
//! clamped to the node's current `stake_lock`. All inputs are replicated
//! state or transaction fields, so every node computes the same amount.

use {
    crate::{
        config::{PenaltyConfig, SlashingConfig},
        error::{PenaltyError, Result},
        types::{BehaviorStats, NodeAccount, OperatorAccount, ViolationType},
    },
    log::debug,
};

const BASIS_POINTS: u128 = 10_000;
const LOST_COUNT_STEP: f64 = 0.2;
const MAX_LOST_BONUS: f64 = 2.0;
const OSCILLATION_STEP: f64 = 0.5;
const RECENCY_WINDOW_HOURS: f64 = 24.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
pub const MAX_MULTIPLIER: f64 = 5.0;

/// Configured percentage of `stake_lock` for `violation_type`.
pub fn base_penalty(
    violation_type: ViolationType,
    stake_lock: u64,
    slashing: &SlashingConfig,
) -> Result<u64> {
    let percent = slashing
        .penalty_percent(violation_type)
        .ok_or(PenaltyError::UnsupportedViolation(violation_type))?;
    let bps = (percent.clamp(0.0, 100.0) * 100.0).round() as u128;
    let amount = u128::from(stake_lock).saturating_mul(bps) / BASIS_POINTS;
    Ok(u64::try_from(amount).unwrap_or(stake_lock))
}

/// Multiplier in `[1.0, 5.0]` derived from a node's history.
///
/// Lost reports add 0.2 each (at most +2.0), oscillations add 0.5 each, and
/// a violation within the last 24 hours scales the sum by up to 2x,
/// decaying linearly to no boost at 24 hours.
pub fn behavior_multiplier(stats: Option<&BehaviorStats>, now_ms: u64) -> f64 {
    let Some(stats) = stats else {
        return 1.0;
    };
    let mut multiplier = 1.0
        + (f64::from(stats.lost_count) * LOST_COUNT_STEP).min(MAX_LOST_BONUS)
        + f64::from(stats.oscillation_count) * OSCILLATION_STEP;

    let last_violation = stats.last_lost_time.max(stats.last_refute_time);
    if last_violation > 0 {
        let hours = now_ms.saturating_sub(last_violation) as f64 / MS_PER_HOUR;
        if hours < RECENCY_WINDOW_HOURS {
            multiplier *= (RECENCY_WINDOW_HOURS - hours) / RECENCY_WINDOW_HOURS + 1.0;
        }
    }
    multiplier.min(MAX_MULTIPLIER)
}

/// Penalty for one violation, already clamped to `stake_lock`.
///
/// `stats` are the node's stats *before* this violation was recorded.
pub fn penalty_for_violation(
    violation_type: ViolationType,
    stake_lock: u64,
    stats: Option<&BehaviorStats>,
    now_ms: u64,
    slashing: &SlashingConfig,
) -> Result<u64> {
    let base = base_penalty(violation_type, stake_lock, slashing)?;
    let multiplier = behavior_multiplier(stats, now_ms);
    let scaled = (base as f64 * multiplier).floor() as u64;
    debug!(
        "penalty for {violation_type}: base {base} x {multiplier:.3} = {scaled} (stake {stake_lock})"
    );
    Ok(clamp_to_stake(scaled, stake_lock))
}

pub fn clamp_to_stake(penalty: u64, stake_lock: u64) -> u64 {
    penalty.min(stake_lock)
}

/// Book `penalty` against the node and its operator. Neither stake balance
/// is debited. Returns the amount actually booked.
pub fn apply_penalty(node: &mut NodeAccount, operator: &mut OperatorAccount, penalty: u64) -> u64 {
    let applied = clamp_to_stake(penalty, node.stake_lock);
    node.penalty = node.penalty.saturating_add(applied);
    node.node_stats.total_penalty = node.node_stats.total_penalty.saturating_add(applied);
    operator.operator_stats.total_node_penalty = operator
        .operator_stats
        .total_node_penalty
        .saturating_add(applied);
    applied
}

/// Whether the node's locked stake has fallen below the low-stake line.
pub fn is_low_stake(node: &NodeAccount, config: &PenaltyConfig) -> bool {
    let threshold = u128::from(config.stake_required)
        .saturating_mul(u128::from(config.low_stake_percent))
        / 100;
    u128::from(node.stake_lock) < threshold
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches, proptest::prelude::*};

    const HOUR: u64 = 3_600_000;

    #[test]
    fn test_base_penalty_default_percent() {
        let slashing = SlashingConfig::default();
        assert_eq!(
            base_penalty(ViolationType::LeftNetworkEarly, 1_000, &slashing).unwrap(),
            200
        );
        assert_eq!(
            base_penalty(ViolationType::SyncingTooLong, 0, &slashing).unwrap(),
            0
        );
    }

    #[test]
    fn test_base_penalty_fractional_percent() {
        let slashing = SlashingConfig {
            node_refuted_penalty_percent: 12.5,
            ..SlashingConfig::default()
        };
        assert_eq!(
            base_penalty(ViolationType::NodeRefuted, 1_000, &slashing).unwrap(),
            125
        );
    }

    #[test]
    fn test_base_penalty_large_stake() {
        let slashing = SlashingConfig::default();
        assert_eq!(
            base_penalty(ViolationType::LeftNetworkEarly, u64::MAX, &slashing).unwrap(),
            u64::MAX / 5
        );
    }

    #[test]
    fn test_double_vote_fails_loudly() {
        assert_matches!(
            base_penalty(ViolationType::DoubleVote, 1_000, &SlashingConfig::default()),
            Err(PenaltyError::UnsupportedViolation(ViolationType::DoubleVote))
        );
    }

    #[test]
    fn test_multiplier_without_history() {
        assert_eq!(behavior_multiplier(None, 0), 1.0);
        assert_eq!(behavior_multiplier(Some(&BehaviorStats::default()), HOUR), 1.0);
    }

    #[test]
    fn test_multiplier_recency_boost() {
        let stats = BehaviorStats {
            lost_count: 1,
            last_lost_time: 100 * HOUR,
            ..BehaviorStats::default()
        };
        // just happened: (1 + 0.2) * 2
        assert!((behavior_multiplier(Some(&stats), 100 * HOUR) - 2.4).abs() < 1e-9);
        // 12 hours later: (1 + 0.2) * 1.5
        assert!((behavior_multiplier(Some(&stats), 112 * HOUR) - 1.8).abs() < 1e-9);
        // a day later the boost is gone
        assert!((behavior_multiplier(Some(&stats), 124 * HOUR) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_caps() {
        let stats = BehaviorStats {
            lost_count: 50,
            oscillation_count: 10,
            last_lost_time: HOUR,
            ..BehaviorStats::default()
        };
        assert_eq!(behavior_multiplier(Some(&stats), HOUR), MAX_MULTIPLIER);
    }

    #[test]
    fn test_penalty_for_first_violation() {
        let penalty = penalty_for_violation(
            ViolationType::LeftNetworkEarly,
            1_000,
            None,
            HOUR,
            &SlashingConfig::default(),
        )
        .unwrap();
        assert_eq!(penalty, 200);
    }

    #[test]
    fn test_penalty_clamped_to_stake() {
        let slashing = SlashingConfig {
            left_network_early_penalty_percent: 100.0,
            ..SlashingConfig::default()
        };
        let stats = BehaviorStats {
            lost_count: 5,
            last_lost_time: HOUR,
            ..BehaviorStats::default()
        };
        let penalty =
            penalty_for_violation(ViolationType::LeftNetworkEarly, 1_000, Some(&stats), HOUR, &slashing)
                .unwrap();
        assert_eq!(penalty, 1_000);
    }

    #[test]
    fn test_apply_penalty_books_both_accounts() {
        let mut node = NodeAccount {
            stake_lock: 500,
            penalty: 100,
            ..NodeAccount::default()
        };
        let mut operator = OperatorAccount {
            stake: 9_999,
            ..OperatorAccount::default()
        };
        assert_eq!(apply_penalty(&mut node, &mut operator, 800), 500);
        assert_eq!(node.penalty, 600);
        assert_eq!(node.node_stats.total_penalty, 500);
        assert_eq!(node.stake_lock, 500);
        assert_eq!(operator.operator_stats.total_node_penalty, 500);
        assert_eq!(operator.stake, 9_999);
    }

    #[test]
    fn test_is_low_stake() {
        let config = PenaltyConfig {
            stake_required: 1_000,
            low_stake_percent: 50,
            ..PenaltyConfig::default()
        };
        let mut node = NodeAccount {
            stake_lock: 499,
            ..NodeAccount::default()
        };
        assert!(is_low_stake(&node, &config));
        node.stake_lock = 500;
        assert!(!is_low_stake(&node, &config));
    }

    fn stats_strategy() -> impl Strategy<Value = BehaviorStats> {
        (0u32..40, 0u32..20, 0u64..48 * HOUR).prop_map(|(lost, osc, last)| BehaviorStats {
            lost_count: lost,
            oscillation_count: osc,
            last_lost_time: last,
            ..BehaviorStats::default()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_multiplier_in_range(stats in stats_strategy(), now in 0u64..96 * HOUR) {
            let m = behavior_multiplier(Some(&stats), now);
            prop_assert!((1.0..=MAX_MULTIPLIER).contains(&m), "multiplier {m}");
        }

        #[test]
        fn prop_multiplier_monotonic(
            stats in stats_strategy(),
            extra_lost in 0u32..10,
            extra_osc in 0u32..10,
            now in 0u64..96 * HOUR,
        ) {
            let base = behavior_multiplier(Some(&stats), now);
            let more_lost = BehaviorStats { lost_count: stats.lost_count + extra_lost, ..stats };
            let more_osc = BehaviorStats { oscillation_count: stats.oscillation_count + extra_osc, ..stats };
            prop_assert!(behavior_multiplier(Some(&more_lost), now) >= base);
            prop_assert!(behavior_multiplier(Some(&more_osc), now) >= base);
        }

        #[test]
        fn prop_applied_never_exceeds_stake(
            stake in 0u64..u64::MAX / 2,
            percent in 0.0f64..=100.0,
            stats in stats_strategy(),
            now in 0u64..96 * HOUR,
        ) {
            let slashing = SlashingConfig {
                sync_timeout_penalty_percent: percent,
                ..SlashingConfig::default()
            };
            let penalty = penalty_for_violation(
                ViolationType::SyncingTooLong, stake, Some(&stats), now, &slashing,
            ).unwrap();
            prop_assert!(penalty <= stake);

            let mut node = NodeAccount { stake_lock: stake, ..NodeAccount::default() };
            let mut operator = OperatorAccount::default();
            let applied = apply_penalty(&mut node, &mut operator, penalty.saturating_mul(3));
            prop_assert!(applied <= stake);
        }
    }
}
