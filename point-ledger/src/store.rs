//! Balance store and history log
//!
//! The ledger only talks to these traits. The in-memory implementations back
//! the service binary and the tests; a persistent backend plugs in behind the
//! same traits.
//!
//! Neither store serializes mutations per user. That is the ledger's job, via
//! the per-user lock. The stores only guarantee that a single read or write is
//! never torn.

use crate::{
    types::{TransactionRecord, TransactionType, UserBalance, UserId},
    Result,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Keyed store of current balances
pub trait BalanceStore: Send + Sync {
    /// Stored balance, or `None` for a user never written
    fn find(&self, user_id: UserId) -> Result<Option<UserBalance>>;

    /// Write `point` for `user_id`, stamping the update time
    fn insert_or_update(&self, user_id: UserId, point: i64) -> Result<UserBalance>;

    /// Stored balance, defaulting to zero for unknown users
    fn select_by_id(&self, user_id: UserId) -> Result<UserBalance> {
        Ok(self
            .find(user_id)?
            .unwrap_or_else(|| UserBalance::empty(user_id)))
    }
}

/// Append-only log of committed mutations
pub trait HistoryLog: Send + Sync {
    /// Append one record and return it with its assigned id
    fn insert(
        &self,
        user_id: UserId,
        amount: i64,
        tx_type: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> Result<TransactionRecord>;

    /// All records for `user_id`, in insertion order
    fn select_all_by_user_id(&self, user_id: UserId) -> Result<Vec<TransactionRecord>>;
}

/// `DashMap`-backed balance store
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    balances: DashMap<UserId, UserBalance>,
}

impl InMemoryBalanceStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a stored balance
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Whether no balance has been written yet
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl BalanceStore for InMemoryBalanceStore {
    fn find(&self, user_id: UserId) -> Result<Option<UserBalance>> {
        Ok(self.balances.get(&user_id).map(|entry| entry.value().clone()))
    }

    fn insert_or_update(&self, user_id: UserId, point: i64) -> Result<UserBalance> {
        let balance = UserBalance {
            user_id,
            point,
            updated_at: Utc::now(),
        };
        self.balances.insert(user_id, balance.clone());
        Ok(balance)
    }
}

/// History log keeping per-user vectors behind one `RwLock`
#[derive(Debug)]
pub struct InMemoryHistoryLog {
    records: RwLock<HashMap<UserId, Vec<TransactionRecord>>>,
    next_id: AtomicU64,
}

impl InMemoryHistoryLog {
    /// Create empty log
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Total records across all users
    pub fn total_records(&self) -> usize {
        self.records.read().values().map(Vec::len).sum()
    }
}

impl Default for InMemoryHistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLog for InMemoryHistoryLog {
    fn insert(
        &self,
        user_id: UserId,
        amount: i64,
        tx_type: TransactionType,
        timestamp: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        let mut records = self.records.write();
        // Assigned under the write lock so ids follow insertion order
        let record = TransactionRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            amount,
            tx_type,
            timestamp,
        };
        records.entry(user_id).or_default().push(record.clone());

        tracing::debug!(
            record_id = record.id,
            user_id = %user_id,
            tx_type = %tx_type,
            amount,
            "History record appended"
        );

        Ok(record)
    }

    fn select_all_by_user_id(&self, user_id: UserId) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .records
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_defaults_to_zero() {
        let store = InMemoryBalanceStore::new();
        assert_eq!(store.find(UserId::new(1)).unwrap(), None);

        let balance = store.select_by_id(UserId::new(1)).unwrap();
        assert_eq!(balance.point, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_or_update() {
        let store = InMemoryBalanceStore::new();
        let first = store.insert_or_update(UserId::new(1), 100).unwrap();
        assert_eq!(first.point, 100);

        let second = store.insert_or_update(UserId::new(1), 40).unwrap();
        assert_eq!(second.point, 40);
        assert!(second.updated_at >= first.updated_at);

        assert_eq!(store.select_by_id(UserId::new(1)).unwrap(), second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_insertion_order_and_ids() {
        let log = InMemoryHistoryLog::new();
        let now = Utc::now();

        log.insert(UserId::new(1), 100, TransactionType::Charge, now).unwrap();
        log.insert(UserId::new(2), 5, TransactionType::Charge, now).unwrap();
        log.insert(UserId::new(1), 30, TransactionType::Use, now).unwrap();

        let history = log.select_all_by_user_id(UserId::new(1)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, 1);
        assert_eq!(history[0].tx_type, TransactionType::Charge);
        assert_eq!(history[1].id, 3);
        assert_eq!(history[1].amount, 30);
        assert_eq!(log.total_records(), 3);
    }

    #[test]
    fn test_history_unknown_user_is_empty() {
        let log = InMemoryHistoryLog::new();
        assert!(log.select_all_by_user_id(UserId::new(99)).unwrap().is_empty());
    }
}
