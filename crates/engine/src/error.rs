//! The module contains the error the engine can throw.
//!
//! Parameter and existence errors are raised before any lock is taken.
//! [`LockAcquisitionFailed`] aborts before the ledger is touched, while
//! [`InsufficientFunds`] and [`RecipientCapExceeded`] are raised with the locks
//! held and always come back after a full rollback.
//!
//!  [`LockAcquisitionFailed`]: EngineError::LockAcquisitionFailed
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`RecipientCapExceeded`]: EngineError::RecipientCapExceeded
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Sender {0} not found")]
    SenderNotFound(i64),
    #[error("Recipient {0} not found")]
    RecipientNotFound(i64),
    #[error("Account of user {0} not found")]
    AccountNotFound(i64),
    #[error("Could not acquire lock \"{0}\"")]
    LockAcquisitionFailed(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Recipient cap exceeded: {0}")]
    RecipientCapExceeded(String),
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Balance accrual is already running")]
    AccrualInProgress,
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict(_) | Self::LockAcquisitionFailed(_)
        )
    }

    /// Classifies a database error raised inside a ledger transaction.
    ///
    /// Lock waits that timed out, detected deadlocks and busy databases become
    /// [`EngineError::ConcurrencyConflict`]; everything else stays a
    /// [`EngineError::Database`].
    pub fn from_ledger(err: DbErr) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        const CONFLICT_MARKERS: [&str; 7] = [
            "database is locked",
            "database table is locked",
            "deadlock detected",
            "could not serialize access",
            "lock timeout",
            "could not obtain lock",
            "lock wait timeout",
        ];
        if CONFLICT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Self::ConcurrencyConflict(message)
        } else {
            Self::Database(err)
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidParameters(a), Self::InvalidParameters(b)) => a == b,
            (Self::SenderNotFound(a), Self::SenderNotFound(b)) => a == b,
            (Self::RecipientNotFound(a), Self::RecipientNotFound(b)) => a == b,
            (Self::AccountNotFound(a), Self::AccountNotFound(b)) => a == b,
            (Self::LockAcquisitionFailed(a), Self::LockAcquisitionFailed(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::RecipientCapExceeded(a), Self::RecipientCapExceeded(b)) => a == b,
            (Self::ConcurrencyConflict(a), Self::ConcurrencyConflict(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::AccrualInProgress, Self::AccrualInProgress) => true,
            (Self::Overflow(a), Self::Overflow(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
