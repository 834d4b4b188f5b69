//! Penalty subsystem configuration.
//!
//! [`SlashingConfig`] holds the network-wide slashing parameters that every
//! node must agree on (they are replicated through the network account).
//! [`PenaltyConfig`] wraps it together with node-local tunables for
//! injection, caching and removal-certificate collection.

use {
    crate::types::ViolationType,
    serde::{Deserialize, Serialize},
};

/// Network-wide slashing parameters.
///
/// Penalty percentages are whole percent of the node's `stake_lock`
/// (`20.0` means 20 %). Fractional percentages are honoured to two decimal
/// places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashingConfig {
    /// Whether `LeftNetworkEarly` violations are penalised.
    pub enable_left_network_early_slashing: bool,
    /// Whether `NodeRefuted` violations are penalised.
    pub enable_node_refuted_slashing: bool,
    /// Whether `SyncingTooLong` violations are penalised.
    pub enable_sync_timeout_slashing: bool,
    /// Base penalty for leaving the network early.
    pub left_network_early_penalty_percent: f64,
    /// Base penalty for being refuted.
    pub node_refuted_penalty_percent: f64,
    /// Base penalty for a sync timeout.
    pub sync_timeout_penalty_percent: f64,
}

impl Default for SlashingConfig {
    fn default() -> Self {
        Self {
            enable_left_network_early_slashing: true,
            enable_node_refuted_slashing: true,
            enable_sync_timeout_slashing: true,
            left_network_early_penalty_percent: 20.0,
            node_refuted_penalty_percent: 20.0,
            sync_timeout_penalty_percent: 20.0,
        }
    }
}

impl SlashingConfig {
    /// Whether slashing is switched on for `violation_type`. `None` for
    /// reserved types that have no toggle.
    pub fn is_enabled(&self, violation_type: ViolationType) -> Option<bool> {
        match violation_type {
            ViolationType::LeftNetworkEarly => Some(self.enable_left_network_early_slashing),
            ViolationType::NodeRefuted => Some(self.enable_node_refuted_slashing),
            ViolationType::SyncingTooLong => Some(self.enable_sync_timeout_slashing),
            ViolationType::DoubleVote => None,
        }
    }

    /// Base penalty percentage for `violation_type`.
    pub fn penalty_percent(&self, violation_type: ViolationType) -> Option<f64> {
        match violation_type {
            ViolationType::LeftNetworkEarly => Some(self.left_network_early_penalty_percent),
            ViolationType::NodeRefuted => Some(self.node_refuted_penalty_percent),
            ViolationType::SyncingTooLong => Some(self.sync_timeout_penalty_percent),
            ViolationType::DoubleVote => None,
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, pct) in [
            ("left_network_early_penalty_percent", self.left_network_early_penalty_percent),
            ("node_refuted_penalty_percent", self.node_refuted_penalty_percent),
            ("sync_timeout_penalty_percent", self.sync_timeout_penalty_percent),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                return Err(ConfigError::InvalidPenaltyPercent { name, value: pct });
            }
        }
        Ok(())
    }
}

/// Node-local configuration for the penalty subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    /// Network-wide slashing parameters.
    pub slashing: SlashingConfig,

    /// How many of the nodes closest to the reported node actually submit
    /// the penalty transaction.
    /// Default: 5.
    pub number_of_nodes_to_inject_penalty_tx: usize,

    /// Duration of one network cycle in milliseconds.
    /// Default: 60_000.
    pub cycle_duration_ms: u64,

    /// Cached penalty transactions older than this many cycles are evicted.
    /// Default: 5.
    pub cache_max_age_cycles: u64,

    /// Step used to push the deterministic transaction timestamp into the
    /// future.
    /// Default: 30_000.
    pub timestamp_step_ms: u64,

    /// Size of the removal committee (closest nodes to the target).
    /// Default: 5.
    pub removal_committee_size: usize,

    /// Signatures required on a removal certificate.
    /// Default: 4.
    pub removal_required_signatures: usize,

    /// Committee members that may be unreachable while still collecting
    /// a quorum.
    /// Default: 1.
    pub removal_backup_nodes: usize,

    /// Upper bound on the wait for removal-certificate signatures.
    /// Default: 10_000.
    pub signature_collection_timeout_ms: u64,

    /// Interval of the periodic cache eviction task.
    /// Default: 60_000 (one cycle).
    pub eviction_interval_ms: u64,

    /// Attach an internal receipt carrying the penalty to the apply response.
    pub support_internal_tx_receipt: bool,

    /// Enforce the per-type violation payload schema during validation.
    /// When false only the presence of the payload is checked.
    pub strict_violation_data: bool,

    /// Stake a node must lock to participate.
    pub stake_required: u64,

    /// A node whose `stake_lock` falls under this percentage of
    /// `stake_required` is considered low-stake.
    /// Default: 50.
    pub low_stake_percent: u64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            slashing: SlashingConfig::default(),
            number_of_nodes_to_inject_penalty_tx: 5,
            cycle_duration_ms: 60_000,
            cache_max_age_cycles: 5,
            timestamp_step_ms: 30_000,
            removal_committee_size: 5,
            removal_required_signatures: 4,
            removal_backup_nodes: 1,
            signature_collection_timeout_ms: 10_000,
            eviction_interval_ms: 60_000,
            support_internal_tx_receipt: true,
            strict_violation_data: true,
            stake_required: 10_000_000_000,
            low_stake_percent: 50,
        }
    }
}

impl PenaltyConfig {
    /// Maximum age of a cached penalty transaction in milliseconds.
    pub fn cache_max_age_ms(&self) -> u64 {
        self.cycle_duration_ms
            .saturating_mul(self.cache_max_age_cycles)
    }

    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.slashing.validate()?;
        if self.cycle_duration_ms == 0 {
            return Err(ConfigError::InvalidCycleDuration);
        }
        if self.timestamp_step_ms == 0 {
            return Err(ConfigError::InvalidTimestampStep);
        }
        if self.eviction_interval_ms == 0 {
            return Err(ConfigError::InvalidEvictionInterval);
        }
        if self.number_of_nodes_to_inject_penalty_tx == 0 {
            return Err(ConfigError::InvalidInjectorCount);
        }
        if self.removal_required_signatures == 0
            || self.removal_required_signatures > self.removal_committee_size
        {
            return Err(ConfigError::InvalidRemovalQuorum {
                required: self.removal_required_signatures,
                committee: self.removal_committee_size,
            });
        }
        if self.low_stake_percent > 100 {
            return Err(ConfigError::InvalidLowStakePercent(self.low_stake_percent));
        }
        Ok(())
    }

    /// Create a config suitable for local testing with shorter timeouts.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            cycle_duration_ms: 1_000,
            signature_collection_timeout_ms: 500,
            eviction_interval_ms: 1_000,
            stake_required: 1_000,
            ..Self::default()
        }
    }
}

/// Errors in penalty configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be in [0, 100], got {value}")]
    InvalidPenaltyPercent { name: &'static str, value: f64 },
    #[error("cycle_duration_ms must be > 0")]
    InvalidCycleDuration,
    #[error("timestamp_step_ms must be > 0")]
    InvalidTimestampStep,
    #[error("eviction_interval_ms must be > 0")]
    InvalidEvictionInterval,
    #[error("number_of_nodes_to_inject_penalty_tx must be > 0")]
    InvalidInjectorCount,
    #[error("removal quorum {required} is invalid for a committee of {committee}")]
    InvalidRemovalQuorum { required: usize, committee: usize },
    #[error("low_stake_percent must be <= 100, got {0}")]
    InvalidLowStakePercent(u64),
    #[error("failed to parse penalty config: {0}")]
    Parse(String),
}
