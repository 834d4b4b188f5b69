//! Application of penalty transactions to account state.
//!
//! ```text
//! Received -> Validated -> Deduplicated (skip)
//!                       -> RateLimited  (skip)
//!                       -> PenaltyApplied -> [RemovalEvaluated] -> Committed
//! ```
//!
//! The node and operator records are cloned, mutated, and written back only
//! when the transaction commits, so an early exit never leaves partial
//! changes behind. Validation-class failures are reported through
//! [`ApplyResponse::set_failed`]; only fatal errors are returned.

use {
    crate::{
        behavior::BehaviorTracker,
        cache::PenaltyTransactionCache,
        calculator,
        config::PenaltyConfig,
        error::{PenaltyError, Result},
        metrics::PenaltyMetrics,
        removal::{self, RemovalCertificateProtocol, RemovalOutcome},
        types::{AccountRecord, AccountStates, PenaltyTransaction},
        validator::PenaltyValidator,
    },
    log::{debug, error, info},
    std::sync::Arc,
};

/// How far an apply attempt progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyStage {
    #[default]
    Received,
    Validated,
    Deduplicated,
    RateLimited,
    PenaltyApplied,
    RemovalEvaluated,
    Committed,
}

/// An account written by a committed apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedAccount {
    pub address: String,
    pub record: AccountRecord,
    pub tx_id: String,
    pub timestamp: u64,
}

/// Internal-transaction receipt for an applied penalty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyReceipt {
    pub tx_id: String,
    /// Public key of the penalised node.
    pub nominee: String,
    /// Operator that staked for the node.
    pub nominator: String,
    pub timestamp: u64,
    /// Always zero; penalties do not spend funds.
    pub amount_spent: u64,
    pub penalty: u64,
}

/// Sink the apply pipeline reports into.
#[derive(Debug, Default)]
pub struct ApplyResponse {
    pub failure: Option<String>,
    pub changed_accounts: Vec<ChangedAccount>,
    pub receipt: Option<PenaltyReceipt>,
    pub stage: ApplyStage,
}

impl ApplyResponse {
    pub fn set_failed(&mut self, reason: String) {
        self.failure = Some(reason);
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn add_changed_account(
        &mut self,
        address: &str,
        record: AccountRecord,
        tx_id: &str,
        timestamp: u64,
    ) {
        self.changed_accounts.push(ChangedAccount {
            address: address.to_string(),
            record,
            tx_id: tx_id.to_string(),
            timestamp,
        });
    }
}

pub struct PenaltyApplyPipeline {
    config: Arc<PenaltyConfig>,
    cache: Arc<PenaltyTransactionCache>,
    validator: PenaltyValidator,
    removal: RemovalCertificateProtocol,
    metrics: Arc<PenaltyMetrics>,
}

impl PenaltyApplyPipeline {
    pub fn new(
        config: Arc<PenaltyConfig>,
        cache: Arc<PenaltyTransactionCache>,
        removal: RemovalCertificateProtocol,
        metrics: Arc<PenaltyMetrics>,
    ) -> Self {
        let validator = PenaltyValidator::new(config.clone(), cache.clone());
        Self {
            config,
            cache,
            validator,
            removal,
            metrics,
        }
    }

    /// Apply `tx` against `states`.
    ///
    /// `states` must hold the reported node's record under its public key and
    /// the operator's record under the operator address. The caller holds the
    /// account locks for the duration of the call.
    pub async fn apply(
        &self,
        tx: &PenaltyTransaction,
        tx_id: &str,
        tx_timestamp: u64,
        states: &mut AccountStates,
        response: &mut ApplyResponse,
    ) -> Result<()> {
        response.stage = ApplyStage::Received;
        let node_address = tx.reported_node_public_key.as_str();

        if let Err(err) = self.validator.check(tx_id, tx, true) {
            if err.is_fatal() {
                error!("applyPenaltyTx: {tx_id} for node {node_address} aborted: {err}");
                return Err(err);
            }
            self.metrics.validation_failures.inc();
            debug!("applyPenaltyTx: {tx_id} failed validation: {err}");
            response.set_failed(format!(
                "applyPenaltyTx failed validation for node {node_address}: {err}"
            ));
            return Ok(());
        }
        response.stage = ApplyStage::Validated;

        let violation_type = tx.violation_type()?;
        let event_time = tx
            .violation_data
            .as_ref()
            .map(|data| data.event_time())
            .ok_or_else(|| PenaltyError::MalformedTransaction("missing violation data".to_string()))?;

        let mut node = states
            .get(node_address)
            .ok_or_else(|| PenaltyError::AccountNotFound(node_address.to_string()))?
            .as_node(node_address)?
            .clone();
        let operator_address = tx.operator_address.as_str();
        let mut operator = states
            .get(operator_address)
            .ok_or_else(|| PenaltyError::AccountNotFound(operator_address.to_string()))?
            .as_operator(operator_address)?
            .clone();

        let last_penalty_time = node.node_stats.last_penalty_time;
        if event_time <= last_penalty_time {
            self.metrics.already_processed.inc();
            let err = PenaltyError::AlreadyProcessed {
                event_time,
                last_penalty_time,
            };
            debug!("applyPenaltyTx: {tx_id} for node {node_address}: {err}");
            response.stage = ApplyStage::Deduplicated;
            response.set_failed(format!(
                "applyPenaltyTx failed for node {node_address}: {err}"
            ));
            return Ok(());
        }

        if let Some(next_allowed) =
            BehaviorTracker::is_rate_limited(node.behavior_stats.as_ref(), violation_type, tx_timestamp)
        {
            self.metrics.rate_limited.inc();
            let err = PenaltyError::RateLimited {
                node_id: node.id.clone(),
                next_allowed,
            };
            debug!("applyPenaltyTx: {tx_id}: {err}");
            response.stage = ApplyStage::RateLimited;
            response.set_failed(err.to_string());
            return Ok(());
        }

        let stats_before = node.behavior_stats;
        let penalty = calculator::penalty_for_violation(
            violation_type,
            node.stake_lock,
            stats_before.as_ref(),
            tx_timestamp,
            &self.config.slashing,
        )?;
        BehaviorTracker::record_violation(&mut node, violation_type, tx_timestamp)?;
        let applied = calculator::apply_penalty(&mut node, &mut operator, penalty);
        response.stage = ApplyStage::PenaltyApplied;
        info!(
            "applyPenaltyTx: {violation_type} penalty of {applied} booked against node {} (operator {operator_address}, total {})",
            node.id, node.penalty
        );

        if let Some(trigger) = BehaviorTracker::removal_trigger(node.behavior_stats.as_ref()) {
            response.stage = ApplyStage::RemovalEvaluated;
            match self.removal.run(node_address, tx_timestamp, trigger).await? {
                RemovalOutcome::Removed(_) => {
                    self.metrics.removals.inc();
                    removal::hard_reset(&mut node);
                    info!("applyPenaltyTx: node {} removed ({trigger})", node.id);
                }
                RemovalOutcome::QuorumNotReached { .. } => self.metrics.quorum_failures.inc(),
                RemovalOutcome::NotInCommittee => {}
            }
        }

        node.node_stats.last_penalty_time = event_time;
        node.timestamp = tx_timestamp;
        operator.timestamp = tx_timestamp;
        self.cache.record(tx_id, tx);

        let node_record = AccountRecord::Node(node);
        let operator_record = AccountRecord::Operator(operator);
        response.add_changed_account(node_address, node_record.clone(), tx_id, tx_timestamp);
        response.add_changed_account(operator_address, operator_record.clone(), tx_id, tx_timestamp);
        states.insert(node_address.to_string(), node_record);
        states.insert(operator_address.to_string(), operator_record);

        if self.config.support_internal_tx_receipt {
            response.receipt = Some(PenaltyReceipt {
                tx_id: tx_id.to_string(),
                nominee: node_address.to_string(),
                nominator: operator_address.to_string(),
                timestamp: tx_timestamp,
                amount_spent: 0,
                penalty: applied,
            });
        }
        self.metrics.applied.inc();
        response.stage = ApplyStage::Committed;
        Ok(())
    }
}
