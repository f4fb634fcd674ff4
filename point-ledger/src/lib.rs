//! Point Ledger
//!
//! Per-user point balances with an append-only mutation history.
//!
//! # Architecture
//!
//! - **Per-key locking**: every charge/use runs under its user's mutex;
//!   different users never share a lock
//! - **Validate under lock**: the balance that is checked is the balance that
//!   is written
//! - **Two stores, no 2PC**: a committed balance whose history append fails is
//!   reported as [`Error::HistoryWriteFailed`], never rolled back
//!
//! # Invariants
//!
//! - Non-negative: `point >= 0` after every committed mutation
//! - No lost updates: N mutations on one user apply as if sequential
//! - One record per committed mutation, in commit order

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod store;
pub mod ledger;
pub mod lock;
pub mod validator;
pub mod error;
pub mod config;
pub mod metrics;
pub mod response;

// Re-exports
pub use error::{Error, Result};
pub use types::{TransactionRecord, TransactionType, UserBalance, UserId};
pub use ledger::PointLedger;
pub use config::Config;
pub use validator::ValidationError;
