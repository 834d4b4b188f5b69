//! Deterministic construction of penalty transactions.
//!
//! Every honest node that observes the same violation must produce a
//! bit-identical unsigned transaction so the network can agree on it without
//! extra coordination. The only time-dependent field, `timestamp`, is derived
//! from the reporting cycle's end time by stepping forward in fixed
//! increments until it lies in the future.

use {
    crate::{
        crypto,
        error::{PenaltyError, Result},
        interfaces::{AccountStore, ClusterView},
        types::{AccountRecord, InternalTxType, PenaltyTransaction, Violation},
    },
    log::debug,
    solana_signer::Signer,
};

/// Smallest timestamp strictly after `now_ms` that is reachable from
/// `cycle_end_secs * 1000` in steps of `step_ms`.
pub fn deterministic_timestamp(cycle_end_secs: u64, now_ms: u64, step_ms: u64) -> u64 {
    let base = cycle_end_secs.saturating_mul(1000);
    if base > now_ms || step_ms == 0 {
        return base;
    }
    let steps = (now_ms.saturating_sub(base) / step_ms).saturating_add(1);
    base.saturating_add(steps.saturating_mul(step_ms))
}

/// A signed penalty transaction together with its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPenaltyTx {
    pub tx_id: String,
    pub tx: PenaltyTransaction,
}

/// Builds and signs penalty transactions.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyTransactionBuilder {
    timestamp_step_ms: u64,
}

impl PenaltyTransactionBuilder {
    pub fn new(timestamp_step_ms: u64) -> Self {
        Self { timestamp_step_ms }
    }

    /// Assemble the unsigned transaction for `violation`.
    pub fn build_unsigned(
        &self,
        violation: &Violation,
        operator_address: String,
        now_ms: u64,
    ) -> PenaltyTransaction {
        PenaltyTransaction {
            reported_node_id: violation.reported_node_id.clone(),
            reported_node_public_key: violation.reported_node_public_key.clone(),
            operator_address,
            violation_type: violation.violation_type as u16,
            violation_data: Some(violation.data),
            timestamp: deterministic_timestamp(
                violation.cycle_end_time,
                now_ms,
                self.timestamp_step_ms,
            ),
            is_internal_tx: true,
            internal_tx_type: InternalTxType::Penalty,
            signature: None,
        }
    }

    /// Sign `tx` with this node's identity and compute its id from the
    /// unsigned fields.
    pub fn sign(&self, mut tx: PenaltyTransaction, identity: &dyn Signer) -> Result<SignedPenaltyTx> {
        let payload = tx.signable_bytes()?;
        let tx_id = hex::encode(crypto::hash_bytes(&payload).as_ref());
        tx.signature = Some(crypto::sign_payload(identity, &payload));
        Ok(SignedPenaltyTx { tx_id, tx })
    }

    /// Resolve the operator, build and sign in one step.
    pub async fn build(
        &self,
        violation: &Violation,
        accounts: &dyn AccountStore,
        identity: &(dyn Signer + Sync),
        now_ms: u64,
    ) -> Result<SignedPenaltyTx> {
        let operator_address =
            resolve_operator_address(accounts, &violation.reported_node_public_key).await?;
        let unsigned = self.build_unsigned(violation, operator_address, now_ms);
        let signed = self.sign(unsigned, identity)?;
        debug!(
            "built penalty tx {} for node {} ({}) timestamp {}",
            signed.tx_id,
            violation.reported_node_id,
            violation.violation_type,
            signed.tx.timestamp
        );
        Ok(signed)
    }
}

/// Look up the operator bound to the node staked under `node_public_key`.
pub async fn resolve_operator_address(
    accounts: &dyn AccountStore,
    node_public_key: &str,
) -> Result<String> {
    let record = accounts
        .get_account(node_public_key)
        .await
        .ok_or_else(|| PenaltyError::AccountNotFound(node_public_key.to_string()))?;
    match record {
        AccountRecord::Node(node) => node.nominator.ok_or_else(|| {
            PenaltyError::AccountNotFound(format!("operator of node {node_public_key}"))
        }),
        AccountRecord::Operator(_) => Err(PenaltyError::UnexpectedAccountType {
            address: node_public_key.to_string(),
            expected: "node",
        }),
    }
}

/// Whether the local node is one of the `count` nodes closest to the
/// reported node and therefore responsible for submitting.
pub fn is_designated_injector(cluster: &dyn ClusterView, reported_public_key: &str, count: usize) -> bool {
    let local = cluster.local_node_id();
    cluster
        .closest_nodes(reported_public_key, count)
        .iter()
        .any(|id| *id == local)
}
