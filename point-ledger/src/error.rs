//! Error types for the point ledger

use crate::types::{UserBalance, UserId};
use crate::validator::ValidationError;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Requested amount is not legal against the current balance
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Per-user lock not acquired within the bounded wait
    #[error("Lock timeout for user {user_id} after {waited_ms}ms")]
    LockTimeout {
        /// Contended key
        user_id: UserId,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// Lock registry closed while the caller was waiting
    #[error("Interrupted while waiting for lock on user {0}")]
    InterruptedWait(UserId),

    /// Balance committed but the matching history record was not written
    #[error("History write failed for user {user_id} (balance committed at {}): {reason}", .committed.point)]
    HistoryWriteFailed {
        /// User whose balance changed
        user_id: UserId,
        /// Balance as committed by the store
        committed: UserBalance,
        /// Underlying failure
        reason: String,
    },

    /// Balance store or history log failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller sent a request that can never succeed as-is
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// HTTP-style status code for the transport layer
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
