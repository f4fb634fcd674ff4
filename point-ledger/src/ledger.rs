//! Point ledger orchestration layer
//!
//! Ties together the lock registry, validator, balance store and history log
//! into the query/charge/use API.
//!
//! # Example
//!
//! ```no_run
//! use point_ledger::{Config, PointLedger, UserId};
//!
//! #[tokio::main]
//! async fn main() -> point_ledger::Result<()> {
//!     let ledger = PointLedger::in_memory(Config::default())?;
//!
//!     let balance = ledger.charge(UserId::new(1), 500).await?;
//!     assert_eq!(balance.point, 500);
//!
//!     let balance = ledger.use_points(UserId::new(1), 200).await?;
//!     assert_eq!(balance.point, 300);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    lock::KeyLockRegistry,
    metrics::Metrics,
    store::{BalanceStore, HistoryLog, InMemoryBalanceStore, InMemoryHistoryLog},
    types::{TransactionRecord, TransactionType, UserBalance, UserId},
    validator, Config, Error, Result,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;

/// Main ledger interface
pub struct PointLedger {
    /// Current balances
    balances: Arc<dyn BalanceStore>,

    /// Mutation history
    history: Arc<dyn HistoryLog>,

    /// Per-user locks
    locks: KeyLockRegistry,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl PointLedger {
    /// Create ledger over the given stores
    pub fn new(
        config: Config,
        balances: Arc<dyn BalanceStore>,
        history: Arc<dyn HistoryLog>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Metrics::new()?;
        let locks = KeyLockRegistry::with_gauge(&config.lock, metrics.tracked_locks.clone());

        Ok(Self {
            balances,
            history,
            locks,
            metrics,
            config,
        })
    }

    /// Create ledger backed by in-memory stores
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::new(
            config,
            Arc::new(InMemoryBalanceStore::new()),
            Arc::new(InMemoryHistoryLog::new()),
        )
    }

    /// Current balance snapshot (no lock taken)
    pub fn get_balance(&self, user_id: UserId) -> Result<UserBalance> {
        self.balances.select_by_id(user_id)
    }

    /// Full mutation history in insertion order
    pub fn get_history(&self, user_id: UserId) -> Result<Vec<TransactionRecord>> {
        self.history.select_all_by_user_id(user_id)
    }

    /// Add `amount` points to the user's balance
    pub async fn charge(&self, user_id: UserId, amount: i64) -> Result<UserBalance> {
        self.mutate(user_id, amount, TransactionType::Charge).await
    }

    /// Spend `amount` points from the user's balance
    pub async fn use_points(&self, user_id: UserId, amount: i64) -> Result<UserBalance> {
        self.mutate(user_id, amount, TransactionType::Use).await
    }

    /// Lock registry (for shutdown and inspection)
    pub fn locks(&self) -> &KeyLockRegistry {
        &self.locks
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the ledger was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Interrupt pending lock waits and refuse further mutations
    pub fn shutdown(&self) {
        tracing::info!(service = %self.config.service_name, "Shutting down point ledger");
        self.locks.close();
    }

    /// Lock, read, validate, write, record
    async fn mutate(
        &self,
        user_id: UserId,
        amount: i64,
        tx_type: TransactionType,
    ) -> Result<UserBalance> {
        let wait_started = Instant::now();
        let guard = match self.locks.acquire(user_id).await {
            Ok(guard) => guard,
            Err(err) => {
                if matches!(err, Error::LockTimeout { .. }) {
                    self.metrics.lock_timeouts_total.inc();
                }
                return Err(err);
            }
        };
        self.metrics
            .record_lock_wait(wait_started.elapsed().as_secs_f64());

        let current = self.balances.select_by_id(user_id)?;

        let new_point = match validator::apply(&current, amount, tx_type) {
            Ok(point) => point,
            Err(err) => {
                self.metrics.rejections_total.inc();
                tracing::warn!(
                    user_id = %user_id,
                    tx_type = %tx_type,
                    amount,
                    balance = current.point,
                    reason = %err,
                    "Point mutation rejected"
                );
                return Err(err.into());
            }
        };

        let committed = self.balances.insert_or_update(user_id, new_point)?;

        if let Err(err) = self.history.insert(user_id, amount, tx_type, Utc::now()) {
            self.metrics.history_failures_total.inc();
            tracing::error!(
                user_id = %user_id,
                tx_type = %tx_type,
                amount,
                committed_point = committed.point,
                error = %err,
                "Balance committed without history record"
            );
            return Err(Error::HistoryWriteFailed {
                user_id,
                committed,
                reason: err.to_string(),
            });
        }

        drop(guard);

        match tx_type {
            TransactionType::Charge => self.metrics.charges_total.inc(),
            TransactionType::Use => self.metrics.uses_total.inc(),
        }

        tracing::debug!(
            user_id = %user_id,
            tx_type = %tx_type,
            amount,
            point = committed.point,
            "Point mutation committed"
        );

        Ok(committed)
    }
}

impl std::fmt::Debug for PointLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointLedger")
            .field("locks", &self.locks)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidationError;
    use chrono::DateTime;

    fn create_test_ledger() -> PointLedger {
        PointLedger::in_memory(Config::default()).unwrap()
    }

    /// History log that refuses every append
    struct FailingHistoryLog;

    impl HistoryLog for FailingHistoryLog {
        fn insert(
            &self,
            _user_id: UserId,
            _amount: i64,
            _tx_type: TransactionType,
            _timestamp: DateTime<Utc>,
        ) -> Result<TransactionRecord> {
            Err(Error::Storage("history unavailable".to_string()))
        }

        fn select_all_by_user_id(&self, _user_id: UserId) -> Result<Vec<TransactionRecord>> {
            Ok(vec![])
        }
    }

    /// Balance store that refuses every write
    struct ReadOnlyBalanceStore;

    impl BalanceStore for ReadOnlyBalanceStore {
        fn find(&self, _user_id: UserId) -> Result<Option<UserBalance>> {
            Ok(None)
        }

        fn insert_or_update(&self, _user_id: UserId, _point: i64) -> Result<UserBalance> {
            Err(Error::Storage("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_charge_and_use_example() {
        let ledger = create_test_ledger();
        let user = UserId::new(1);

        ledger.charge(user, 100).await.unwrap();

        let balance = ledger.charge(user, 50).await.unwrap();
        assert_eq!(balance.point, 150);

        let balance = ledger.use_points(user, 30).await.unwrap();
        assert_eq!(balance.point, 120);

        let result = ledger.use_points(user, 200).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InsufficientBalance {
                available: 120,
                requested: 200,
            }))
        ));
        assert_eq!(ledger.get_balance(user).unwrap().point, 120);

        let history = ledger.get_history(user).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].tx_type, TransactionType::Charge);
        assert_eq!(history[1].amount, 50);
        assert_eq!(history[2].tx_type, TransactionType::Use);
        assert_eq!(history[2].amount, 30);
    }

    #[tokio::test]
    async fn test_unknown_user_has_zero_balance() {
        let ledger = create_test_ledger();
        let balance = ledger.get_balance(UserId::new(404)).unwrap();
        assert_eq!(balance.point, 0);
        assert!(ledger.get_history(UserId::new(404)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_charge_rejected() {
        let ledger = create_test_ledger();
        let user = UserId::new(1);

        for amount in [0, -5] {
            let result = ledger.charge(user, amount).await;
            assert!(matches!(
                result,
                Err(Error::Validation(ValidationError::NonPositiveAmount { .. }))
            ));
        }

        assert_eq!(ledger.get_balance(user).unwrap().point, 0);
        assert!(ledger.get_history(user).unwrap().is_empty());
        assert_eq!(ledger.metrics().rejections_total.get(), 2);
    }

    #[tokio::test]
    async fn test_use_on_empty_balance_rejected() {
        let ledger = create_test_ledger();
        let result = ledger.use_points(UserId::new(1), 1).await;
        assert!(result.unwrap_err().is_client_error());
    }

    #[tokio::test]
    async fn test_lock_timeout_leaves_state_unchanged() {
        let mut config = Config::default();
        config.lock.timeout_ms = 50;
        let ledger = PointLedger::in_memory(config).unwrap();
        let user = UserId::new(1);

        ledger.charge(user, 100).await.unwrap();

        let held = ledger.locks().acquire(user).await.unwrap();
        let result = ledger.charge(user, 10).await;
        assert!(matches!(result, Err(Error::LockTimeout { .. })));
        drop(held);

        assert_eq!(ledger.get_balance(user).unwrap().point, 100);
        assert_eq!(ledger.get_history(user).unwrap().len(), 1);
        assert_eq!(ledger.metrics().lock_timeouts_total.get(), 1);
    }

    #[tokio::test]
    async fn test_history_failure_surfaces_committed_balance() {
        let balances = Arc::new(InMemoryBalanceStore::new());
        let ledger =
            PointLedger::new(Config::default(), balances.clone(), Arc::new(FailingHistoryLog))
                .unwrap();
        let user = UserId::new(5);

        let result = ledger.charge(user, 70).await;
        match result {
            Err(Error::HistoryWriteFailed {
                user_id,
                committed,
                reason,
            }) => {
                assert_eq!(user_id, user);
                assert_eq!(committed.point, 70);
                assert!(reason.contains("history unavailable"));
            }
            other => panic!("expected HistoryWriteFailed, got {:?}", other),
        }

        // Balance stays committed; no rollback
        assert_eq!(balances.select_by_id(user).unwrap().point, 70);
        assert_eq!(ledger.metrics().history_failures_total.get(), 1);

        // Lock was released despite the failure
        assert_eq!(ledger.locks().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_balance_write_failure_records_nothing() {
        let history = Arc::new(InMemoryHistoryLog::new());
        let ledger =
            PointLedger::new(Config::default(), Arc::new(ReadOnlyBalanceStore), history.clone())
                .unwrap();

        let result = ledger.charge(UserId::new(1), 10).await;
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(history.total_records(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_mutations() {
        let ledger = create_test_ledger();
        ledger.shutdown();

        let result = ledger.charge(UserId::new(1), 10).await;
        assert!(matches!(result, Err(Error::InterruptedWait(_))));
        assert_eq!(ledger.get_balance(UserId::new(1)).unwrap().point, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.lock.timeout_ms = 0;
        assert!(matches!(
            PointLedger::in_memory(config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_tracked_locks_gauge_follows_registry() {
        let ledger = create_test_ledger();

        ledger.charge(UserId::new(1), 10).await.unwrap();
        ledger.charge(UserId::new(2), 10).await.unwrap();
        assert!(ledger.use_points(UserId::new(3), 10).await.is_err());

        assert_eq!(ledger.locks().tracked_keys(), 0);
        assert_eq!(
            ledger.metrics().tracked_locks.get(),
            ledger.locks().tracked_keys() as i64
        );
    }

    #[tokio::test]
    async fn test_tracked_locks_gauge_after_manual_eviction() {
        let mut config = Config::default();
        config.lock.evict_idle = false;
        let ledger = PointLedger::in_memory(config).unwrap();

        ledger.charge(UserId::new(1), 10).await.unwrap();
        ledger.charge(UserId::new(2), 10).await.unwrap();
        assert_eq!(ledger.metrics().tracked_locks.get(), 2);

        assert_eq!(ledger.locks().evict_idle(), 2);
        assert_eq!(ledger.metrics().tracked_locks.get(), 0);
    }

    #[tokio::test]
    async fn test_metrics_count_commits() {
        let ledger = create_test_ledger();
        let user = UserId::new(1);

        ledger.charge(user, 10).await.unwrap();
        ledger.charge(user, 10).await.unwrap();
        ledger.use_points(user, 5).await.unwrap();

        assert_eq!(ledger.metrics().charges_total.get(), 2);
        assert_eq!(ledger.metrics().uses_total.get(), 1);
    }
}
