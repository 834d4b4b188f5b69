//! TRv1 Node-Behaviour Penalties
//!
//! Detects validator misbehaviour (leaving the network early, being refuted
//! by peers, timing out during sync), turns each violation into a
//! deterministic penalty transaction, books a stake penalty scaled by the
//! node's recent history, and removes persistently misbehaving nodes through
//! a quorum-signed certificate.
//!
//! # Flow
//!
//! 1. **Classify**: a network event becomes a typed [`Violation`].
//! 2. **Build**: every node derives the same unsigned transaction and id;
//!    the transaction is signed and cached locally.
//! 3. **Inject**: only the nodes closest to the reported node submit it,
//!    after waiting for its deterministic timestamp.
//! 4. **Validate**: shape, type range, policy flag and signature; when
//!    applying, the transaction must also be in the local cache.
//! 5. **Apply**: idempotence and rate-limit guards, behaviour stats, penalty,
//!    and removal once a threshold is crossed.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      PenaltyService                       │
//! │  ┌────────────┐  ┌─────────────┐  ┌──────────────────┐    │
//! │  │ Violation  │  │ Transaction │  │ PenaltyTx Cache  │    │
//! │  │ Classifier │─▶│   Builder   │─▶│  (evict timer)   │    │
//! │  └────────────┘  └─────────────┘  └──────────────────┘    │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │                 PenaltyApplyPipeline                │  │
//! │  │  Validator ─▶ BehaviorTracker ─▶ Calculator         │  │
//! │  │                       └─▶ RemovalCertificateProtocol│  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod behavior;
pub mod builder;
pub mod cache;
pub mod calculator;
pub mod config;
pub mod crypto;
pub mod error;
pub mod interfaces;
pub mod metrics;
pub mod pipeline;
pub mod removal;
pub mod scheduler;
pub mod service;
#[cfg(any(test, feature = "dev-context-only-utils"))]
pub mod testing;
pub mod types;
pub mod validator;
pub mod violation;

// Re-exports for convenience
pub use behavior::{BehaviorTracker, RemovalTrigger};
pub use builder::{PenaltyTransactionBuilder, SignedPenaltyTx};
pub use cache::PenaltyTransactionCache;
pub use config::{ConfigError, PenaltyConfig, SlashingConfig};
pub use error::{PenaltyError, Result};
pub use pipeline::{ApplyResponse, ApplyStage, PenaltyApplyPipeline, PenaltyReceipt};
pub use removal::{RemovalCertificateProtocol, RemovalOutcome};
pub use service::{spawn_cache_eviction, InjectionOutcome, PenaltyContext, PenaltyService};
pub use types::{
    AccountRecord, AccountStates, BehaviorStats, NodeAccount, OperatorAccount, PenaltyTransaction,
    RemovalCertificate, Violation, ViolationData, ViolationType,
};
pub use validator::{PenaltyValidator, ValidationResult};
pub use violation::{classify, ViolationEvent};
