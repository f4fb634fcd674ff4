//! Core types for the point ledger
//!
//! Points are whole numbers held in `i64` so that a negative request amount
//! is representable and can be rejected by the validator instead of by the
//! type system at the transport boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier (partitions all locking and storage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Create new user ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current point balance of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    /// Owner of the balance
    pub user_id: UserId,

    /// Point total (never negative once committed)
    pub point: i64,

    /// Last time the store wrote this balance
    pub updated_at: DateTime<Utc>,
}

impl UserBalance {
    /// Zero balance for a user the store has never seen
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            point: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Direction of a point mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Points added
    Charge,
    /// Points spent
    Use,
}

impl TransactionType {
    /// Upper-case label used in logs and serialized records
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Charge => "CHARGE",
            TransactionType::Use => "USE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable history entry for one committed mutation
///
/// `amount` is always the requested (positive) magnitude. The direction is
/// carried by `tx_type`; use [`TransactionRecord::signed_amount`] to get the
/// effect on the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Sequence number assigned by the history log (starts at 1)
    pub id: u64,

    /// User the mutation applied to
    pub user_id: UserId,

    /// Requested magnitude
    pub amount: i64,

    /// Charge or use
    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Time the ledger recorded the mutation
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Effect of this record on the balance
    pub fn signed_amount(&self) -> i64 {
        match self.tx_type {
            TransactionType::Charge => self.amount,
            TransactionType::Use => -self.amount,
        }
    }
}
