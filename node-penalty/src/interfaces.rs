//! Collaborators the penalty subsystem consumes but does not implement.
//!
//! The state-replication engine, the cluster view and the transport are
//! owned by the surrounding node. Implementations must be cheap to call
//! from async code; long waits (signature collection) are bounded by the
//! caller with a timeout.

use {
    crate::types::{
        AccountRecord, CycleInfo, NodeId, PenaltyTransaction, RemovalCertificate, TxSignature,
        UnsignedRemovalCertificate,
    },
    async_trait::async_trait,
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    std::time::{SystemTime, UNIX_EPOCH},
};

/// Read access to replicated account state.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch an account from local storage or, failing that, from a peer
    /// that covers the address.
    async fn get_account(&self, address: &str) -> Option<AccountRecord>;
}

/// This node's view of the active cluster.
pub trait ClusterView: Send + Sync {
    /// Identifier of the local node.
    fn local_node_id(&self) -> NodeId;

    /// The `count` active nodes closest to `key` under the network's
    /// distance metric, nearest first.
    fn closest_nodes(&self, key: &str, count: usize) -> Vec<NodeId>;

    /// Signing key of an active node, used to check committee signatures.
    fn public_key_of(&self, node_id: &str) -> Option<Pubkey>;

    fn current_cycle(&self) -> CycleInfo;
}

/// Outcome of handing a transaction to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub success: bool,
    pub reason: String,
    pub status: u16,
}

/// A request for committee signatures on a removal certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequest {
    pub topic: &'static str,
    pub payload_hash: Hash,
    pub required: usize,
    pub payload: UnsignedRemovalCertificate,
    /// How many extra nodes may be asked when a committee member is down.
    pub backup_allowance: usize,
}

/// Signatures gathered for a [`SignatureRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureCollection {
    pub success: bool,
    pub signatures: Vec<TxSignature>,
}

/// Events this subsystem emits to the rest of the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkNotice {
    /// Remove the certified node from active duty.
    RemoveNode(RemovalCertificate),
}

impl NetworkNotice {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkNotice::RemoveNode(_) => "remove-by-app",
        }
    }
}

/// Transport used to inject transactions and coordinate with peers.
#[async_trait]
pub trait PenaltyNetwork: Send + Sync {
    async fn submit_transaction(&self, tx: &PenaltyTransaction) -> SubmissionResult;

    async fn collect_signatures(&self, request: SignatureRequest) -> SignatureCollection;

    fn emit_event(&self, notice: NetworkNotice);
}

/// Source of network time in milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
