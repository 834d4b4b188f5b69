//! Quorum-signed removal of misbehaving nodes.
//!
//! When a node crosses a removal threshold, the nodes closest to it form a
//! committee. A committee member drafts an unsigned certificate, collects
//! signatures from its peers and, once the quorum is met, broadcasts the
//! certificate so the node is dropped from active duty. A failed collection
//! leaves the already-applied penalty in place; removal is re-attempted only
//! when a later violation trips the threshold again.

use {
    crate::{
        behavior::RemovalTrigger,
        config::PenaltyConfig,
        crypto,
        error::Result,
        interfaces::{ClusterView, NetworkNotice, PenaltyNetwork, SignatureCollection, SignatureRequest},
        types::{NodeAccount, RemovalCertificate, TxSignature, UnsignedRemovalCertificate},
    },
    log::{debug, info, warn},
    std::{collections::HashSet, sync::Arc, time::Duration},
};

/// Topic under which committee signatures are requested.
pub const REMOVAL_TOPIC: &str = "node-removal";

const REMOVAL_REASON: &str = "Node removed due to excessive violations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The local node is not on the committee for this target.
    NotInCommittee,
    /// Quorum reached and the certificate was broadcast.
    Removed(RemovalCertificate),
    QuorumNotReached { collected: usize, required: usize },
}

pub struct RemovalCertificateProtocol {
    config: Arc<PenaltyConfig>,
    cluster: Arc<dyn ClusterView>,
    network: Arc<dyn PenaltyNetwork>,
}

impl RemovalCertificateProtocol {
    pub fn new(
        config: Arc<PenaltyConfig>,
        cluster: Arc<dyn ClusterView>,
        network: Arc<dyn PenaltyNetwork>,
    ) -> Self {
        Self {
            config,
            cluster,
            network,
        }
    }

    /// Drive one removal attempt for the node keyed by `node_public_key`.
    pub async fn run(
        &self,
        node_public_key: &str,
        tx_timestamp: u64,
        trigger: RemovalTrigger,
    ) -> Result<RemovalOutcome> {
        let local = self.cluster.local_node_id();
        let committee = self
            .cluster
            .closest_nodes(node_public_key, self.config.removal_committee_size);
        if !committee.contains(&local) {
            debug!("removal: {local} is not on the committee for {node_public_key}, skipping");
            return Ok(RemovalOutcome::NotInCommittee);
        }

        let unsigned = UnsignedRemovalCertificate {
            node_public_key: node_public_key.to_string(),
            cycle: self.cluster.current_cycle().counter,
            reason: format!("{REMOVAL_REASON} ({trigger})"),
            timestamp: tx_timestamp,
        };
        let payload_hash = unsigned.payload_hash()?;
        let required = self.config.removal_required_signatures;
        let request = SignatureRequest {
            topic: REMOVAL_TOPIC,
            payload_hash,
            required,
            payload: unsigned.clone(),
            backup_allowance: self.config.removal_backup_nodes,
        };

        let timeout = Duration::from_millis(self.config.signature_collection_timeout_ms);
        let collection = match tokio::time::timeout(timeout, self.network.collect_signatures(request)).await {
            Ok(collection) => collection,
            Err(_) => {
                warn!("removal: signature collection for {node_public_key} timed out after {timeout:?}");
                SignatureCollection::default()
            }
        };

        let signatures = self.accept_signatures(node_public_key, payload_hash.as_ref(), collection.signatures);
        if !collection.success || signatures.len() < required {
            warn!(
                "removal: failed to reach quorum for {node_public_key}: {} of {required} signatures",
                signatures.len()
            );
            return Ok(RemovalOutcome::QuorumNotReached {
                collected: signatures.len(),
                required,
            });
        }

        let certificate = RemovalCertificate::new(unsigned, signatures);
        let notice = NetworkNotice::RemoveNode(certificate.clone());
        info!(
            "removal: emitting {} for {node_public_key} ({trigger}) with {} signatures",
            notice.name(),
            certificate.signatures.len()
        );
        self.network.emit_event(notice);
        Ok(RemovalOutcome::Removed(certificate))
    }

    /// Keep one valid signature per committee member, backups included.
    fn accept_signatures(
        &self,
        node_public_key: &str,
        message: &[u8],
        signatures: Vec<TxSignature>,
    ) -> Vec<TxSignature> {
        let eligible = self.config.removal_committee_size.saturating_add(self.config.removal_backup_nodes);
        let trusted: HashSet<_> = self
            .cluster
            .closest_nodes(node_public_key, eligible)
            .iter()
            .filter_map(|id| self.cluster.public_key_of(id))
            .collect();
        let mut seen = HashSet::new();
        signatures
            .into_iter()
            .filter(|sig| trusted.contains(&sig.owner))
            .filter(|sig| crypto::verify_signature(message, sig))
            .filter(|sig| seen.insert(sig.owner))
            .collect()
    }
}

/// Clear the stake-related fields of a removed node. The lifetime
/// `total_penalty` stat is kept.
pub fn hard_reset(node: &mut NodeAccount) {
    node.nominator = None;
    node.stake_lock = 0;
    node.penalty = 0;
    node.reward_start_time = 0;
    node.reward_end_time = 0;
    node.behavior_stats = None;
}
