//! Acceptance checks for penalty transactions.
//!
//! Checks run in a fixed order and stop at the first failure. The cache
//! check only runs when the transaction is being applied: an applying node
//! refuses any penalty it did not independently mint or observe.

use {
    crate::{
        cache::PenaltyTransactionCache,
        config::PenaltyConfig,
        crypto,
        error::{PenaltyError, Result},
        types::{PenaltyTransaction, ViolationData, ViolationType, NODE_ID_LEN},
    },
    log::debug,
    std::sync::Arc,
};

/// Outcome of [`PenaltyValidator::validate`].
///
/// `reason` is empty on success and the failing check's message otherwise.
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: String,
    error: Option<PenaltyError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            reason: String::new(),
            error: None,
        }
    }

    pub fn failed(error: PenaltyError) -> Self {
        Self {
            is_valid: false,
            reason: error.to_string(),
            error: Some(error),
        }
    }

    /// The typed error behind a failure.
    pub fn error(&self) -> Option<&PenaltyError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl From<Result<()>> for ValidationResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => Self::failed(err),
        }
    }
}

pub struct PenaltyValidator {
    config: Arc<PenaltyConfig>,
    cache: Arc<PenaltyTransactionCache>,
}

impl PenaltyValidator {
    pub fn new(config: Arc<PenaltyConfig>, cache: Arc<PenaltyTransactionCache>) -> Self {
        Self { config, cache }
    }

    /// Run every check and report the first failure as a [`ValidationResult`].
    pub fn validate(&self, tx_id: &str, tx: &PenaltyTransaction, is_apply: bool) -> ValidationResult {
        let result = ValidationResult::from(self.check(tx_id, tx, is_apply));
        if !result.is_valid {
            debug!(
                "validatePenaltyTx: rejected {} for node {} (apply: {}): {}",
                tx_id, tx.reported_node_id, is_apply, result.reason
            );
        }
        result
    }

    /// Same checks as [`Self::validate`], surfaced as a typed error.
    pub fn check(&self, tx_id: &str, tx: &PenaltyTransaction, is_apply: bool) -> Result<()> {
        if tx.reported_node_id.len() != NODE_ID_LEN {
            return Err(PenaltyError::MalformedTransaction(format!(
                "reported node id must be {NODE_ID_LEN} characters, got {}",
                tx.reported_node_id.len()
            )));
        }
        if tx.reported_node_public_key.is_empty() {
            return Err(PenaltyError::MalformedTransaction(
                "missing reported node public key".to_string(),
            ));
        }
        if tx.operator_address.is_empty() {
            return Err(PenaltyError::MalformedTransaction(
                "missing operator address".to_string(),
            ));
        }
        let violation_type = tx.violation_type()?;
        let data = tx.violation_data.as_ref().ok_or_else(|| {
            PenaltyError::MalformedTransaction("missing violation data".to_string())
        })?;
        if self.config.strict_violation_data {
            check_violation_data(violation_type, data)?;
        }
        if is_apply {
            self.check_corroborated(tx_id, tx)?;
        }
        if tx.timestamp == 0 {
            return Err(PenaltyError::MalformedTransaction(
                "timestamp must be > 0".to_string(),
            ));
        }
        match self.config.slashing.is_enabled(violation_type) {
            Some(true) => {}
            Some(false) => return Err(PenaltyError::PolicyDisabled(violation_type)),
            None => return Err(PenaltyError::UnsupportedViolation(violation_type)),
        }
        let signature = tx.signature.as_ref().ok_or(PenaltyError::SignatureInvalid)?;
        if !crypto::verify_signature(&tx.signable_bytes()?, signature) {
            return Err(PenaltyError::SignatureInvalid);
        }
        Ok(())
    }

    fn check_corroborated(&self, tx_id: &str, tx: &PenaltyTransaction) -> Result<()> {
        let cached = self
            .cache
            .lookup(tx_id)
            .ok_or_else(|| PenaltyError::NotCorroborated(tx_id.to_string()))?;
        if cached.signable_bytes()? != tx.signable_bytes()? {
            return Err(PenaltyError::NotCorroborated(tx_id.to_string()));
        }
        Ok(())
    }
}

/// Per-type payload shape.
pub fn check_violation_data(violation_type: ViolationType, data: &ViolationData) -> Result<()> {
    if violation_type == ViolationType::DoubleVote {
        return Err(PenaltyError::UnsupportedViolation(violation_type));
    }
    if !data.matches(violation_type) {
        return Err(PenaltyError::MalformedTransaction(format!(
            "violation data does not match {violation_type}"
        )));
    }
    if let ViolationData::Lost(lost) = data {
        if violation_type == ViolationType::LeftNetworkEarly && lost.node_dropped_cycle.is_none() {
            return Err(PenaltyError::MalformedTransaction(
                "missing node dropped cycle".to_string(),
            ));
        }
    }
    if data.event_time() == 0 {
        return Err(PenaltyError::MalformedTransaction(
            "violation event time must be > 0".to_string(),
        ));
    }
    Ok(())
}
