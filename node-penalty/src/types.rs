//! Core types for the penalty subsystem.
//!
//! Defines the violation model, the wire-level penalty transaction, the
//! account records the apply pipeline mutates, and the removal certificate.

use {
    crate::error::{PenaltyError, Result},
    serde::{Deserialize, Serialize},
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    solana_signature::Signature,
    std::collections::HashMap,
};

/// Hex-encoded 32-byte node identifier (64 characters).
pub type NodeId = String;

/// Required length of a reported node identifier.
pub const NODE_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// The kind of misbehaviour a penalty transaction reports.
///
/// Discriminants are the on-wire values; anything outside
/// [`ViolationType::MIN_ID`]`..=`[`ViolationType::MAX_ID`] is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ViolationType {
    /// The node dropped out of the network before its rotation ended.
    LeftNetworkEarly = 1000,
    /// The node was reported lost and then refuted the report.
    NodeRefuted = 1001,
    /// The node exceeded the allowed sync time.
    SyncingTooLong = 1002,
    /// Reserved; no penalty rule exists yet.
    DoubleVote = 1003,
}

impl ViolationType {
    pub const MIN_ID: u16 = ViolationType::LeftNetworkEarly as u16;
    pub const MAX_ID: u16 = ViolationType::DoubleVote as u16;

    /// Lost-class violations share the lost counters and rate-limit window.
    pub fn is_lost_class(self) -> bool {
        matches!(
            self,
            ViolationType::LeftNetworkEarly | ViolationType::SyncingTooLong
        )
    }
}

impl TryFrom<u16> for ViolationType {
    type Error = PenaltyError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            1000 => Ok(ViolationType::LeftNetworkEarly),
            1001 => Ok(ViolationType::NodeRefuted),
            1002 => Ok(ViolationType::SyncingTooLong),
            1003 => Ok(ViolationType::DoubleVote),
            other => Err(PenaltyError::MalformedTransaction(format!(
                "violation type {other} out of range"
            ))),
        }
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationType::LeftNetworkEarly => write!(f, "LeftNetworkEarly"),
            ViolationType::NodeRefuted => write!(f, "NodeRefuted"),
            ViolationType::SyncingTooLong => write!(f, "SyncingTooLong"),
            ViolationType::DoubleVote => write!(f, "DoubleVote"),
        }
    }
}

/// Payload for `LeftNetworkEarly` and `SyncingTooLong`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeLostViolationData {
    pub node_lost_cycle: u64,
    /// Only present when the node was dropped (apoptosized).
    pub node_dropped_cycle: Option<u64>,
    pub node_dropped_time: u64,
}

/// Payload for `NodeRefuted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRefutedViolationData {
    pub node_refuted_cycle: u64,
    pub node_refuted_time: u64,
}

/// Typed violation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationData {
    Lost(NodeLostViolationData),
    Refuted(NodeRefutedViolationData),
}

impl ViolationData {
    /// Time at which the underlying network event happened. Compared with
    /// `last_penalty_time` to detect duplicate delivery.
    pub fn event_time(&self) -> u64 {
        match self {
            ViolationData::Lost(data) => data.node_dropped_time,
            ViolationData::Refuted(data) => data.node_refuted_time,
        }
    }

    /// Whether this payload shape belongs to `violation_type`.
    pub fn matches(&self, violation_type: ViolationType) -> bool {
        match self {
            ViolationData::Lost(_) => violation_type.is_lost_class(),
            ViolationData::Refuted(_) => violation_type == ViolationType::NodeRefuted,
        }
    }
}

/// A classified violation, ready to be turned into a penalty transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub violation_type: ViolationType,
    pub data: ViolationData,
    pub reported_node_id: NodeId,
    pub reported_node_public_key: String,
    /// Cycle-end time of the reporting cycle, in seconds.
    pub cycle_end_time: u64,
}

// ---------------------------------------------------------------------------
// Penalty transaction
// ---------------------------------------------------------------------------

/// Internal transaction kinds. Only penalties are produced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InternalTxType {
    Penalty,
}

/// A signature together with the key that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub owner: Pubkey,
    pub sig: Signature,
}

/// The penalty transaction as it travels between nodes.
///
/// Fields are kept in their wire form (strings, raw `u16` type) so that
/// malformed transactions from peers can be represented and rejected by
/// the validator instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyTransaction {
    pub reported_node_id: NodeId,
    pub reported_node_public_key: String,
    pub operator_address: String,
    pub violation_type: u16,
    pub violation_data: Option<ViolationData>,
    /// Deterministic, future-aligned timestamp in milliseconds.
    pub timestamp: u64,
    pub is_internal_tx: bool,
    pub internal_tx_type: InternalTxType,
    pub signature: Option<TxSignature>,
}

/// Borrowed view over every signed field. The signature is excluded so the
/// encoding is identical on every honest node.
#[derive(Serialize)]
struct UnsignedPenaltyTransaction<'a> {
    reported_node_id: &'a str,
    reported_node_public_key: &'a str,
    operator_address: &'a str,
    violation_type: u16,
    violation_data: &'a Option<ViolationData>,
    timestamp: u64,
    is_internal_tx: bool,
    internal_tx_type: InternalTxType,
}

impl PenaltyTransaction {
    /// Canonical bytes covered by the signature and the transaction id.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        let unsigned = UnsignedPenaltyTransaction {
            reported_node_id: &self.reported_node_id,
            reported_node_public_key: &self.reported_node_public_key,
            operator_address: &self.operator_address,
            violation_type: self.violation_type,
            violation_data: &self.violation_data,
            timestamp: self.timestamp,
            is_internal_tx: self.is_internal_tx,
            internal_tx_type: self.internal_tx_type,
        };
        Ok(bincode::serialize(&unsigned)?)
    }

    /// Content-derived transaction id (hex of the hash of the unsigned
    /// fields). Independent of who signed.
    pub fn tx_id(&self) -> Result<String> {
        let hash = crate::crypto::hash_bytes(&self.signable_bytes()?);
        Ok(hex::encode(hash.as_ref()))
    }

    /// Decode the wire violation type.
    pub fn violation_type(&self) -> Result<ViolationType> {
        ViolationType::try_from(self.violation_type)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Rolling misbehaviour statistics for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorStats {
    pub lost_count: u32,
    pub refute_count: u32,
    pub last_lost_time: u64,
    pub last_refute_time: u64,
    pub oscillation_count: u32,
    pub last_oscillation_time: u64,
    pub consecutive_lost_refutes: u32,
}

/// Per-node penalty bookkeeping that survives removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAccountStats {
    /// Event time of the last violation applied to this node.
    pub last_penalty_time: u64,
    /// Sum of every penalty ever applied.
    pub total_penalty: u64,
}

/// Staking record of a validator node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAccount {
    pub id: NodeId,
    /// Operator address that staked for this node.
    pub nominator: Option<String>,
    pub stake_lock: u64,
    /// Penalty accumulated against `stake_lock`. Bookkeeping only.
    pub penalty: u64,
    pub reward_start_time: u64,
    pub reward_end_time: u64,
    pub node_stats: NodeAccountStats,
    pub behavior_stats: Option<BehaviorStats>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStats {
    pub total_node_penalty: u64,
}

/// Account of the operator that nominated a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAccount {
    pub address: String,
    /// Spendable stake. Never debited by this subsystem.
    pub stake: u64,
    pub operator_stats: OperatorStats,
    pub timestamp: u64,
}

/// Discriminant for [`AccountRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Node,
    Operator,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Node => "node",
            AccountType::Operator => "operator",
        }
    }
}

/// An account record as delivered by the state layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountRecord {
    Node(NodeAccount),
    Operator(OperatorAccount),
}

impl AccountRecord {
    pub fn account_type(&self) -> AccountType {
        match self {
            AccountRecord::Node(_) => AccountType::Node,
            AccountRecord::Operator(_) => AccountType::Operator,
        }
    }

    /// Borrow as a node account, failing on any other account type.
    pub fn as_node(&self, address: &str) -> Result<&NodeAccount> {
        match self {
            AccountRecord::Node(node) => Ok(node),
            AccountRecord::Operator(_) => Err(PenaltyError::UnexpectedAccountType {
                address: address.to_string(),
                expected: AccountType::Node.as_str(),
            }),
        }
    }

    /// Borrow as an operator account, failing on any other account type.
    pub fn as_operator(&self, address: &str) -> Result<&OperatorAccount> {
        match self {
            AccountRecord::Operator(operator) => Ok(operator),
            AccountRecord::Node(_) => Err(PenaltyError::UnexpectedAccountType {
                address: address.to_string(),
                expected: AccountType::Operator.as_str(),
            }),
        }
    }
}

/// Accounts locked for one apply call, keyed by address.
pub type AccountStates = HashMap<String, AccountRecord>;

// ---------------------------------------------------------------------------
// Cycles and removal
// ---------------------------------------------------------------------------

/// Snapshot of the current network cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleInfo {
    pub counter: u64,
    /// Cycle start, in seconds.
    pub start: u64,
    /// Cycle duration, in seconds.
    pub duration: u64,
}

/// The part of a removal certificate that committee members sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedRemovalCertificate {
    pub node_public_key: String,
    pub cycle: u64,
    pub reason: String,
    pub timestamp: u64,
}

impl UnsignedRemovalCertificate {
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Hash committee members sign over.
    pub fn payload_hash(&self) -> Result<Hash> {
        Ok(crate::crypto::hash_bytes(&self.signable_bytes()?))
    }
}

/// A quorum-signed authorisation to remove a node from active duty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalCertificate {
    pub node_public_key: String,
    pub cycle: u64,
    pub reason: String,
    pub timestamp: u64,
    pub signatures: Vec<TxSignature>,
}

impl RemovalCertificate {
    pub fn new(unsigned: UnsignedRemovalCertificate, signatures: Vec<TxSignature>) -> Self {
        Self {
            node_public_key: unsigned.node_public_key,
            cycle: unsigned.cycle,
            reason: unsigned.reason,
            timestamp: unsigned.timestamp,
            signatures,
        }
    }

    pub fn unsigned(&self) -> UnsignedRemovalCertificate {
        UnsignedRemovalCertificate {
            node_public_key: self.node_public_key.clone(),
            cycle: self.cycle,
            reason: self.reason.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, solana_keypair::Keypair, solana_signer::Signer};

    fn sample_tx() -> PenaltyTransaction {
        PenaltyTransaction {
            reported_node_id: "ab".repeat(32),
            reported_node_public_key: "cd".repeat(32),
            operator_address: "0xoperator".to_string(),
            violation_type: ViolationType::NodeRefuted as u16,
            violation_data: Some(ViolationData::Refuted(NodeRefutedViolationData {
                node_refuted_cycle: 7,
                node_refuted_time: 1_700_000_000,
            })),
            timestamp: 1_700_000_030_000,
            is_internal_tx: true,
            internal_tx_type: InternalTxType::Penalty,
            signature: None,
        }
    }

    #[test]
    fn test_violation_type_range() {
        assert_eq!(
            ViolationType::try_from(1001).unwrap(),
            ViolationType::NodeRefuted
        );
        assert!(ViolationType::try_from(ViolationType::MIN_ID - 1).is_err());
        assert!(ViolationType::try_from(ViolationType::MAX_ID + 1).is_err());
    }

    #[test]
    fn test_violation_data_matches_type() {
        let lost = ViolationData::Lost(NodeLostViolationData {
            node_lost_cycle: 1,
            node_dropped_cycle: Some(2),
            node_dropped_time: 99,
        });
        assert!(lost.matches(ViolationType::LeftNetworkEarly));
        assert!(lost.matches(ViolationType::SyncingTooLong));
        assert!(!lost.matches(ViolationType::NodeRefuted));
        assert_eq!(lost.event_time(), 99);
    }

    #[test]
    fn test_tx_id_ignores_signature() {
        let unsigned = sample_tx();
        let mut signed = sample_tx();
        signed.signature = Some(TxSignature {
            owner: Keypair::new().pubkey(),
            sig: Signature::default(),
        });
        assert_eq!(unsigned.tx_id().unwrap(), signed.tx_id().unwrap());
        assert_eq!(unsigned.tx_id().unwrap().len(), 64);
    }

    #[test]
    fn test_tx_id_changes_with_content() {
        let a = sample_tx();
        let mut b = sample_tx();
        b.timestamp += 30_000;
        assert_ne!(a.tx_id().unwrap(), b.tx_id().unwrap());
    }

    #[test]
    fn test_account_record_type_mismatch() {
        let record = AccountRecord::Operator(OperatorAccount::default());
        assert_eq!(record.account_type(), AccountType::Operator);
        assert!(record.as_operator("op").is_ok());
        assert!(matches!(
            record.as_node("op"),
            Err(PenaltyError::UnexpectedAccountType { expected: "node", .. })
        ));
    }

    #[test]
    fn test_removal_certificate_unsigned_roundtrip() {
        let unsigned = UnsignedRemovalCertificate {
            node_public_key: "cd".repeat(32),
            cycle: 12,
            reason: "test".to_string(),
            timestamp: 5,
        };
        let cert = RemovalCertificate::new(unsigned.clone(), vec![]);
        assert_eq!(cert.unsigned(), unsigned);
        assert_eq!(
            cert.unsigned().payload_hash().unwrap(),
            unsigned.payload_hash().unwrap()
        );
    }
}
