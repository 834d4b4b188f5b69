//! In-memory collaborators for tests and local development.

use {
    crate::{
        crypto,
        interfaces::{
            AccountStore, Clock, ClusterView, NetworkNotice, PenaltyNetwork, SignatureCollection,
            SignatureRequest, SubmissionResult,
        },
        types::{AccountRecord, CycleInfo, NodeId, PenaltyTransaction},
    },
    async_trait::async_trait,
    dashmap::DashMap,
    parking_lot::Mutex,
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
    std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc,
        },
        time::Duration,
    },
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: DashMap<String, AccountRecord>,
}

impl InMemoryAccounts {
    pub fn insert(&self, address: &str, record: AccountRecord) {
        self.accounts.insert(address.to_string(), record);
    }

    pub fn get(&self, address: &str) -> Option<AccountRecord> {
        self.accounts.get(address).map(|r| r.clone())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn get_account(&self, address: &str) -> Option<AccountRecord> {
        self.get(address)
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

pub struct ClusterNode {
    pub id: NodeId,
    pub keypair: Keypair,
}

/// A fixed set of nodes with XOR-distance closeness.
#[derive(Clone)]
pub struct StaticCluster {
    nodes: Arc<Vec<ClusterNode>>,
    local: NodeId,
    cycle: CycleInfo,
}

impl StaticCluster {
    pub fn with_random_nodes(count: usize) -> Self {
        let nodes: Vec<ClusterNode> = (0..count)
            .map(|_| {
                let keypair = Keypair::new();
                ClusterNode {
                    id: crypto::node_id_from_pubkey(&keypair.pubkey()),
                    keypair,
                }
            })
            .collect();
        let local = nodes.first().map(|n| n.id.clone()).unwrap_or_default();
        Self {
            nodes: Arc::new(nodes),
            local,
            cycle: CycleInfo {
                counter: 1,
                start: 1_700_000_000,
                duration: 60,
            },
        }
    }

    /// Same cluster seen from `node_id`.
    pub fn with_local(&self, node_id: &str) -> Self {
        Self {
            local: node_id.to_string(),
            ..self.clone()
        }
    }

    pub fn with_cycle(mut self, cycle: CycleInfo) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn keypair_of(&self, node_id: &str) -> Option<&Keypair> {
        self.nodes
            .iter()
            .find(|n| n.id == node_id)
            .map(|n| &n.keypair)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }
}

fn key_bytes(key: &str) -> Vec<u8> {
    hex::decode(key).unwrap_or_else(|_| key.as_bytes().to_vec())
}

fn xor_distance(a: &[u8], b: &[u8]) -> Vec<u8> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| a.get(i).copied().unwrap_or(0) ^ b.get(i).copied().unwrap_or(0))
        .collect()
}

impl ClusterView for StaticCluster {
    fn local_node_id(&self) -> NodeId {
        self.local.clone()
    }

    fn closest_nodes(&self, key: &str, count: usize) -> Vec<NodeId> {
        let target = key_bytes(key);
        let mut ranked: Vec<(Vec<u8>, &NodeId)> = self
            .nodes
            .iter()
            .map(|n| (xor_distance(&target, &key_bytes(&n.id)), &n.id))
            .collect();
        ranked.sort();
        ranked.into_iter().take(count).map(|(_, id)| id.clone()).collect()
    }

    fn public_key_of(&self, node_id: &str) -> Option<Pubkey> {
        self.keypair_of(node_id).map(|k| k.pubkey())
    }

    fn current_cycle(&self) -> CycleInfo {
        self.cycle
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// How the committee answers a signature request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningBehavior {
    /// Every reachable committee member signs.
    Honest,
    /// Signatures come from keys outside the committee.
    Forged,
    /// The request never completes.
    Stall,
}

/// Network double that records everything it is handed.
pub struct RecordingNetwork {
    cluster: StaticCluster,
    behavior: Mutex<SigningBehavior>,
    unreachable: Mutex<HashSet<NodeId>>,
    submissions: Mutex<Vec<PenaltyTransaction>>,
    notices: Mutex<Vec<NetworkNotice>>,
    requests: Mutex<Vec<SignatureRequest>>,
    reject_submissions: Mutex<Option<String>>,
}

impl RecordingNetwork {
    pub fn new(cluster: StaticCluster) -> Self {
        Self {
            cluster,
            behavior: Mutex::new(SigningBehavior::Honest),
            unreachable: Mutex::default(),
            submissions: Mutex::default(),
            notices: Mutex::default(),
            requests: Mutex::default(),
            reject_submissions: Mutex::default(),
        }
    }

    pub fn set_signing_behavior(&self, behavior: SigningBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_unreachable(&self, node_id: &str) {
        self.unreachable.lock().insert(node_id.to_string());
    }

    pub fn reject_submissions(&self, reason: &str) {
        *self.reject_submissions.lock() = Some(reason.to_string());
    }

    pub fn submissions(&self) -> Vec<PenaltyTransaction> {
        self.submissions.lock().clone()
    }

    pub fn notices(&self) -> Vec<NetworkNotice> {
        self.notices.lock().clone()
    }

    pub fn signature_requests(&self) -> Vec<SignatureRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PenaltyNetwork for RecordingNetwork {
    async fn submit_transaction(&self, tx: &PenaltyTransaction) -> SubmissionResult {
        self.submissions.lock().push(tx.clone());
        let rejection = self.reject_submissions.lock().clone();
        match rejection {
            Some(reason) => SubmissionResult {
                success: false,
                reason,
                status: 500,
            },
            None => SubmissionResult {
                success: true,
                reason: String::new(),
                status: 200,
            },
        }
    }

    async fn collect_signatures(&self, request: SignatureRequest) -> SignatureCollection {
        self.requests.lock().push(request.clone());
        let behavior = *self.behavior.lock();
        if behavior == SigningBehavior::Stall {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            return SignatureCollection::default();
        }

        let asked = request.required.saturating_add(request.backup_allowance);
        let committee = self
            .cluster
            .closest_nodes(&request.payload.node_public_key, asked);
        let unreachable = self.unreachable.lock().clone();
        let message = request.payload_hash.as_ref();
        let signatures: Vec<_> = committee
            .iter()
            .filter(|id| !unreachable.contains(*id))
            .filter_map(|id| self.cluster.keypair_of(id))
            .take(request.required)
            .map(|keypair| match behavior {
                SigningBehavior::Forged => crypto::sign_payload(&Keypair::new(), message),
                _ => crypto::sign_payload(keypair, message),
            })
            .collect();
        SignatureCollection {
            success: signatures.len() >= request.required,
            signatures,
        }
    }

    fn emit_event(&self, notice: NetworkNotice) {
        self.notices.lock().push(notice);
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}
