//! Time-bounded cache of penalty transactions this node minted or applied.
//!
//! The cache serves two purposes: de-duplicating locally minted
//! transactions, and acting as the corroboration gate during apply. A node
//! only executes penalties it has independently seen proposed through the
//! normal pipeline.

use {
    crate::types::PenaltyTransaction,
    dashmap::DashMap,
    log::debug,
};

/// Process-local map from transaction id to signed penalty transaction.
///
/// Constructed once at startup and shared by handle between the builder,
/// the validator and the apply pipeline.
#[derive(Debug, Default)]
pub struct PenaltyTransactionCache {
    entries: DashMap<String, PenaltyTransaction>,
}

impl PenaltyTransactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx` under `tx_id` unless an entry already exists.
    /// Returns true if the entry was inserted.
    pub fn record(&self, tx_id: &str, tx: &PenaltyTransaction) -> bool {
        let mut inserted = false;
        self.entries.entry(tx_id.to_string()).or_insert_with(|| {
            inserted = true;
            tx.clone()
        });
        inserted
    }

    pub fn lookup(&self, tx_id: &str) -> Option<PenaltyTransaction> {
        self.entries.get(tx_id).map(|entry| entry.clone())
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.entries.contains_key(tx_id)
    }

    /// Drop every entry whose transaction timestamp lags `now` by more than
    /// `max_age_ms`. Returns the number of entries removed.
    pub fn evict_older_than(&self, now: u64, max_age_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, tx| now.saturating_sub(tx.timestamp) <= max_age_ms);
        let evicted = before.saturating_sub(self.entries.len());
        debug!(
            "penalty tx cache: evicted {} of {} entries (max age {}ms)",
            evicted, before, max_age_ms
        );
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{InternalTxType, NodeRefutedViolationData, ViolationData, ViolationType},
    };

    const CYCLE_MS: u64 = 60_000;

    fn tx_at(timestamp: u64) -> PenaltyTransaction {
        PenaltyTransaction {
            reported_node_id: "aa".repeat(32),
            reported_node_public_key: "bb".repeat(32),
            operator_address: "operator".to_string(),
            violation_type: ViolationType::NodeRefuted as u16,
            violation_data: Some(ViolationData::Refuted(NodeRefutedViolationData {
                node_refuted_cycle: 1,
                node_refuted_time: timestamp / 1000,
            })),
            timestamp,
            is_internal_tx: true,
            internal_tx_type: InternalTxType::Penalty,
            signature: None,
        }
    }

    #[test]
    fn test_record_is_insert_if_absent() {
        let cache = PenaltyTransactionCache::new();
        let first = tx_at(1_000);
        let second = tx_at(2_000);

        assert!(cache.record("id", &first));
        assert!(!cache.record("id", &second)); // never overwrites
        assert_eq!(cache.lookup("id").unwrap(), first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lookup_missing() {
        let cache = PenaltyTransactionCache::new();
        assert!(cache.lookup("nope").is_none());
        assert!(!cache.contains("nope"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_boundary() {
        let t = 10_000_000;
        let max_age = 5 * CYCLE_MS;

        let cache = PenaltyTransactionCache::new();
        cache.record("id", &tx_at(t));

        assert_eq!(cache.evict_older_than(t + 4 * CYCLE_MS, max_age), 0);
        assert!(cache.contains("id"));

        // exactly 5 cycles old is still retained
        assert_eq!(cache.evict_older_than(t + 5 * CYCLE_MS, max_age), 0);
        assert!(cache.contains("id"));

        assert_eq!(cache.evict_older_than(t + 6 * CYCLE_MS, max_age), 1);
        assert!(!cache.contains("id"));
    }

    #[test]
    fn test_eviction_keeps_future_timestamps() {
        // minted transactions carry future timestamps; they must survive
        let cache = PenaltyTransactionCache::new();
        cache.record("future", &tx_at(5_000_000));
        assert_eq!(cache.evict_older_than(1_000_000, CYCLE_MS), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_partial() {
        let cache = PenaltyTransactionCache::new();
        cache.record("old", &tx_at(0));
        cache.record("new", &tx_at(900_000));
        assert_eq!(cache.evict_older_than(1_000_000, 5 * CYCLE_MS), 1);
        assert!(cache.contains("new"));
        assert!(!cache.contains("old"));
    }
}
