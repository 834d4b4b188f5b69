//! Error types for the node-penalty subsystem.

use {
    crate::{config::ConfigError, types::ViolationType},
    thiserror::Error,
};

/// Errors that can occur while minting, validating or applying a penalty
/// transaction.
///
/// Validation-class variants are reported through the apply response's
/// failure channel. Only the account-shape and unsupported-violation variants
/// escape [`PenaltyApplyPipeline::apply`](crate::pipeline::PenaltyApplyPipeline::apply).
#[derive(Error, Debug)]
pub enum PenaltyError {
    /// A required field is missing or out of range.
    #[error("malformed penalty transaction: {0}")]
    MalformedTransaction(String),

    /// Slashing for this violation type is toggled off network-wide.
    #[error("{0} slashing is disabled")]
    PolicyDisabled(ViolationType),

    /// The signature is missing or does not verify against the claimed signer.
    #[error("invalid signature for penalty tx")]
    SignatureInvalid,

    /// The applying node never minted or observed this transaction.
    #[error("penalty tx {0} not found in the local penalty tx cache")]
    NotCorroborated(String),

    /// The violation's event time is not newer than the node's last penalty.
    #[error("penalty already processed: event time {event_time} <= last penalty time {last_penalty_time}")]
    AlreadyProcessed {
        event_time: u64,
        last_penalty_time: u64,
    },

    /// The violation arrived inside the node's rate-limit window.
    #[error("rate limited penalty tx for node {node_id}: next allowed at {next_allowed}")]
    RateLimited { node_id: String, next_allowed: u64 },

    /// A node or operator record could not be located.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The record at `address` is not of the expected account type.
    #[error("account {address} is not a {expected} account")]
    UnexpectedAccountType {
        address: String,
        expected: &'static str,
    },

    /// The removal certificate did not collect enough committee signatures.
    #[error("removal quorum not reached: {collected} of {required} signatures")]
    QuorumNotReached { collected: usize, required: usize },

    /// The event source reported a tag this node does not understand.
    #[error("unknown violation event: {0}")]
    UnknownEvent(String),

    /// The violation type is reserved and has no penalty rule.
    #[error("violation type {0} is not implemented")]
    UnsupportedViolation(ViolationType),

    /// Canonical encoding of a transaction or certificate failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// The network layer rejected a submission.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The node-local configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PenaltyError {
    /// Returns true for errors that must abort the application attempt
    /// instead of being reported through the apply response.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PenaltyError::AccountNotFound(_)
                | PenaltyError::UnexpectedAccountType { .. }
                | PenaltyError::UnsupportedViolation(_)
                | PenaltyError::Serialization(_)
                | PenaltyError::Config(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PenaltyError>;
