//! Amount validation for point mutations
//!
//! Pure functions: no locks, no I/O. The ledger calls [`apply`] while holding
//! the user's lock so that the checked balance is the one being mutated.

use crate::types::{TransactionType, UserBalance};
use thiserror::Error;

/// Reasons a charge or use request is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount must be strictly positive
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// Requested amount
        amount: i64,
    },

    /// Use amount exceeds the available balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Current balance
        available: i64,
        /// Requested amount
        requested: i64,
    },

    /// Charge would push the balance past `i64::MAX`
    #[error("Balance overflow: {current} + {amount}")]
    BalanceOverflow {
        /// Current balance
        current: i64,
        /// Requested amount
        amount: i64,
    },
}

/// Check whether `amount` may be applied to `current` as `tx_type`
pub fn validate(
    current: &UserBalance,
    amount: i64,
    tx_type: TransactionType,
) -> Result<(), ValidationError> {
    apply(current, amount, tx_type).map(|_| ())
}

/// Validate and compute the resulting point total
pub fn apply(
    current: &UserBalance,
    amount: i64,
    tx_type: TransactionType,
) -> Result<i64, ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount { amount });
    }

    match tx_type {
        TransactionType::Charge => current.point.checked_add(amount).ok_or(
            ValidationError::BalanceOverflow {
                current: current.point,
                amount,
            },
        ),
        TransactionType::Use => {
            if current.point < amount {
                return Err(ValidationError::InsufficientBalance {
                    available: current.point,
                    requested: amount,
                });
            }
            Ok(current.point - amount)
        }
    }
}
