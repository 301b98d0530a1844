//! Error types for the Clearbook exchange core.
//!
//! All errors use the `CB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Amount / coin errors
//! - 3xx: Authorization / escrow errors
//! - 4xx: Market errors
//! - 5xx: Storage errors
//! - 8xx: Invariant violations (fatal)
//! - 9xx: General / internal errors
//!
//! Everything except the 8xx range is recoverable: the caller rejects the
//! request and state is left unchanged. An invariant violation means custody
//! bookkeeping has diverged from order state; it goes through
//! [`invariant_violation`] and halts the state transition.

use thiserror::Error;

use crate::EntityId;

/// Central error enum for all Clearbook operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClearbookError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order does not exist.
    #[error("CB_ERR_100: Order not found: {0}")]
    OrderNotFound(EntityId),

    /// An order with this ID is already stored.
    #[error("CB_ERR_101: Order already exists: {0}")]
    OrderAlreadyExists(EntityId),

    /// The order failed structural validation.
    #[error("CB_ERR_102: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// Time-in-force outside `1..=max`.
    #[error("CB_ERR_103: Invalid time in force: {blocks} blocks (max {max})")]
    InvalidTimeInForce { blocks: u16, max: u16 },

    // =================================================================
    // Amount Errors (2xx)
    // =================================================================
    /// A price/quantity/notional failed validation or normalization.
    #[error("CB_ERR_200: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A coin amount could not be moved as requested.
    #[error("CB_ERR_201: Invalid coins: {reason}")]
    InvalidCoins { reason: String },

    // =================================================================
    // Authorization / Escrow Errors (3xx)
    // =================================================================
    /// The caller may not perform this action.
    #[error("CB_ERR_300: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The owner's available balance cannot cover the escrow.
    #[error("CB_ERR_301: Insufficient funds: need {needed} {asset}, have {available}")]
    InsufficientFunds {
        asset: String,
        needed: u128,
        available: u128,
    },

    // =================================================================
    // Market Errors (4xx)
    // =================================================================
    /// The market is not registered.
    #[error("CB_ERR_400: Market not found: {0}")]
    MarketNotFound(EntityId),

    /// The market definition is malformed.
    #[error("CB_ERR_401: Invalid market: {reason}")]
    InvalidMarket { reason: String },

    // =================================================================
    // Storage Errors (5xx)
    // =================================================================
    /// A keyed record is absent.
    #[error("CB_ERR_500: Not found: {what}")]
    NotFound { what: String },

    /// A keyed record is already present.
    #[error("CB_ERR_501: Already exists: {what}")]
    AlreadyExists { what: String },

    /// The registry has not assigned any identifier yet.
    #[error("CB_ERR_502: No entities defined yet")]
    NoEntities,

    /// A value handed to a registry already carries an identifier.
    #[error("CB_ERR_503: Id must be zero before insertion, got {0}")]
    IdAlreadyAssigned(EntityId),

    /// Marshal / unmarshal failure.
    #[error("CB_ERR_504: Codec error: {0}")]
    Codec(String),

    // =================================================================
    // Invariant Violations (8xx)
    // =================================================================
    /// Custody or storage state diverged from order state. Fatal.
    #[error("CB_ERR_800: Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Invalid configuration.
    #[error("CB_ERR_900: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (config files).
    #[error("CB_ERR_901: I/O error: {0}")]
    Io(String),

    /// Unrecoverable internal error.
    #[error("CB_ERR_902: Internal error: {0}")]
    Internal(String),
}

impl ClearbookError {
    /// Shorthand for a `NotFound` naming the missing record.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Shorthand for an `InvalidAmount`.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Whether this error is one of the "absent record" kinds.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::OrderNotFound(_)
                | Self::MarketNotFound(_)
                | Self::NoEntities
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ClearbookError>;

impl From<std::io::Error> for ClearbookError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ClearbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Halt the current state transition.
///
/// Reached only when custody bookkeeping, storage contents or order state
/// contradict each other. Continuing could create or destroy value, so the
/// process aborts the transition loudly instead of returning an error.
#[cold]
#[track_caller]
pub fn invariant_violation(reason: impl Into<String>) -> ! {
    let err = ClearbookError::InvariantViolation {
        reason: reason.into(),
    };
    tracing::error!(error = %err, "halting state transition");
    panic!("{err}");
}
