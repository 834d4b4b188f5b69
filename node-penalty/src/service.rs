//! Framework-facing entry points of the penalty subsystem.
//!
//! [`PenaltyService`] owns the transaction cache and wires the builder,
//! validator and apply pipeline to the node's collaborators. It is built once
//! at startup and shared behind an `Arc`.

use {
    crate::{
        builder::{self, PenaltyTransactionBuilder},
        cache::PenaltyTransactionCache,
        config::PenaltyConfig,
        error::{PenaltyError, Result},
        interfaces::{AccountStore, Clock, ClusterView, PenaltyNetwork, SubmissionResult},
        metrics::PenaltyMetrics,
        pipeline::{ApplyResponse, PenaltyApplyPipeline},
        removal::RemovalCertificateProtocol,
        scheduler::EvictionTimer,
        types::{AccountStates, PenaltyTransaction},
        validator::{PenaltyValidator, ValidationResult},
        violation::{self, ViolationEvent},
    },
    log::{debug, info, warn},
    solana_keypair::Keypair,
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    },
    tokio::task::JoinHandle,
};

/// Result of [`PenaltyService::classify_and_inject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// This node was a designated injector and submitted the transaction.
    Submitted {
        tx_id: String,
        result: SubmissionResult,
    },
    /// Minted and cached locally; another node submits.
    NotDesignated { tx_id: String },
}

/// External collaborators of the service.
pub struct PenaltyContext {
    pub identity: Arc<Keypair>,
    pub accounts: Arc<dyn AccountStore>,
    pub cluster: Arc<dyn ClusterView>,
    pub network: Arc<dyn PenaltyNetwork>,
    pub clock: Arc<dyn Clock>,
}

pub struct PenaltyService {
    config: Arc<PenaltyConfig>,
    identity: Arc<Keypair>,
    accounts: Arc<dyn AccountStore>,
    cluster: Arc<dyn ClusterView>,
    network: Arc<dyn PenaltyNetwork>,
    clock: Arc<dyn Clock>,
    cache: Arc<PenaltyTransactionCache>,
    metrics: Arc<PenaltyMetrics>,
    builder: PenaltyTransactionBuilder,
    validator: PenaltyValidator,
    pipeline: PenaltyApplyPipeline,
}

impl PenaltyService {
    pub fn new(config: PenaltyConfig, context: PenaltyContext) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let cache = Arc::new(PenaltyTransactionCache::new());
        let metrics = Arc::new(PenaltyMetrics::new());
        let removal = RemovalCertificateProtocol::new(
            config.clone(),
            context.cluster.clone(),
            context.network.clone(),
        );
        let pipeline =
            PenaltyApplyPipeline::new(config.clone(), cache.clone(), removal, metrics.clone());
        Ok(Self {
            builder: PenaltyTransactionBuilder::new(config.timestamp_step_ms),
            validator: PenaltyValidator::new(config.clone(), cache.clone()),
            pipeline,
            config,
            identity: context.identity,
            accounts: context.accounts,
            cluster: context.cluster,
            network: context.network,
            clock: context.clock,
            cache,
            metrics,
        })
    }

    pub fn config(&self) -> &PenaltyConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<PenaltyTransactionCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<PenaltyMetrics> {
        &self.metrics
    }

    /// Turn an observed network event into a penalty transaction.
    ///
    /// Every node mints and caches the transaction. Only the nodes closest
    /// to the reported node wait for its timestamp and submit it.
    pub async fn classify_and_inject(&self, event: ViolationEvent) -> Result<InjectionOutcome> {
        let violation = violation::classify(event)?;
        let signed = self
            .builder
            .build(
                &violation,
                self.accounts.as_ref(),
                self.identity.as_ref(),
                self.clock.now_ms(),
            )
            .await?;
        self.cache.record(&signed.tx_id, &signed.tx);

        if !builder::is_designated_injector(
            self.cluster.as_ref(),
            &violation.reported_node_public_key,
            self.config.number_of_nodes_to_inject_penalty_tx,
        ) {
            self.metrics.injection_skipped.inc();
            debug!(
                "injectPenaltyTx: not a designated injector for {}, skipping {}",
                violation.reported_node_public_key, signed.tx_id
            );
            return Ok(InjectionOutcome::NotDesignated {
                tx_id: signed.tx_id,
            });
        }

        let wait_ms = signed.tx.timestamp.saturating_sub(self.clock.now_ms());
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;

        let result = self.network.submit_transaction(&signed.tx).await;
        if !result.success {
            warn!(
                "injectPenaltyTx: submission of {} rejected ({}): {}",
                signed.tx_id, result.status, result.reason
            );
            return Err(PenaltyError::Submission(format!(
                "{} (status {})",
                result.reason, result.status
            )));
        }
        self.metrics.injected.inc();
        info!(
            "injectPenaltyTx: submitted {} ({}) for node {} at {}",
            signed.tx_id, violation.violation_type, violation.reported_node_id, signed.tx.timestamp
        );
        Ok(InjectionOutcome::Submitted {
            tx_id: signed.tx_id,
            result,
        })
    }

    pub fn validate(&self, tx_id: &str, tx: &PenaltyTransaction, is_apply: bool) -> ValidationResult {
        let result = self.validator.validate(tx_id, tx, is_apply);
        if !result.is_valid {
            self.metrics.validation_failures.inc();
        }
        result
    }

    pub async fn apply(
        &self,
        tx: &PenaltyTransaction,
        tx_id: &str,
        tx_timestamp: u64,
        states: &mut AccountStates,
        response: &mut ApplyResponse,
    ) -> Result<()> {
        self.pipeline
            .apply(tx, tx_id, tx_timestamp, states, response)
            .await
    }

    /// Drop cached transactions older than the configured number of cycles.
    pub fn evict_expired_cache(&self, now_ms: u64) -> usize {
        let evicted = self
            .cache
            .evict_older_than(now_ms, self.config.cache_max_age_ms());
        self.metrics.cache_evictions.add(evicted as u64);
        evicted
    }
}

/// Run [`PenaltyService::evict_expired_cache`] every `eviction_interval_ms`
/// until `exit` is set.
pub fn spawn_cache_eviction(service: Arc<PenaltyService>, exit: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = EvictionTimer::new(service.config.eviction_interval_ms, service.clock.now_ms());
        let mut delay = timer.interval();
        info!("penalty cache eviction started (interval {:?})", delay);
        loop {
            tokio::time::sleep(delay).await;
            if exit.load(Ordering::Relaxed) {
                break;
            }
            let now = service.clock.now_ms();
            let evicted = service.evict_expired_cache(now);
            debug!("penalty cache eviction: removed {evicted}, {} left", service.cache.len());
            delay = timer.rearm(now);
        }
        info!("penalty cache eviction exiting");
    })
}
