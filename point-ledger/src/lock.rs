//! Per-user lock registry
//!
//! Every mutating operation on a user runs while holding that user's
//! `tokio::sync::Mutex`. Different users map to different mutexes, so there is
//! no global serialization point.
//!
//! # Lock identity
//!
//! A key must never have two live mutex objects at the same time. Two rules
//! enforce this:
//!
//! - The `Arc` for a key is looked up (or created) and cloned while the
//!   `DashMap` shard is write-locked.
//! - An entry is removed only under the same shard lock, and only when the map
//!   holds the sole reference (`Arc::strong_count == 1`).
//!
//! Any task that can still contend for the key therefore holds a clone, and
//! that clone keeps the entry resident.
//!
//! ```text
//!   acquire(k) ──► shard lock ──► get-or-create Arc ──► clone ──► unlock shard
//!                                                                   │
//!                 ┌─────────────────────────────────────────────────┘
//!                 ▼
//!   select! { lock_owned() | sleep(timeout) | closed } ──► KeyLockGuard
//!                                                               │ drop
//!                                                               ▼
//!                             release mutex ──► remove_if(strong_count == 1)
//! ```

use crate::{config::LockConfig, types::UserId, Error, Result};
use dashmap::DashMap;
use prometheus::IntGauge;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::{Duration, Instant};

/// Lock entries plus an optional gauge mirroring their count
///
/// The gauge moves only when an entry is actually inserted or removed, so it
/// equals `map.len()` whenever no insert/remove is in flight.
struct LockTable {
    map: DashMap<UserId, Arc<Mutex<()>>>,
    resident: Option<IntGauge>,
}

impl LockTable {
    fn lock_for(&self, user_id: UserId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.map
                .entry(user_id)
                .or_insert_with(|| {
                    if let Some(gauge) = &self.resident {
                        gauge.inc();
                    }
                    Arc::new(Mutex::new(()))
                })
                .value(),
        )
    }

    fn evict_if_idle(&self, user_id: UserId) {
        let removed = self
            .map
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
        if let (Some(_), Some(gauge)) = (removed, &self.resident) {
            gauge.dec();
        }
    }

    fn evict_all_idle(&self) -> usize {
        let mut evicted = 0;
        self.map.retain(|_, lock| {
            let busy = Arc::strong_count(lock) > 1;
            if !busy {
                evicted += 1;
            }
            busy
        });
        if let Some(gauge) = &self.resident {
            gauge.sub(evicted as i64);
        }
        evicted
    }
}

/// Issues one mutex per user key
pub struct KeyLockRegistry {
    locks: Arc<LockTable>,
    timeout: Duration,
    evict_idle: bool,
    closed: watch::Sender<bool>,
}

impl KeyLockRegistry {
    /// Create registry from lock configuration
    pub fn new(config: &LockConfig) -> Self {
        Self::build(config, None)
    }

    /// Create registry that keeps `resident` equal to the number of entries
    pub fn with_gauge(config: &LockConfig, resident: IntGauge) -> Self {
        Self::build(config, Some(resident))
    }

    fn build(config: &LockConfig, resident: Option<IntGauge>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            locks: Arc::new(LockTable {
                map: DashMap::new(),
                resident,
            }),
            timeout: config.timeout(),
            evict_idle: config.evict_idle,
            closed,
        }
    }

    /// Configured bounded wait
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the lock for `user_id`, waiting at most the configured timeout
    ///
    /// Fails with [`Error::LockTimeout`] when the wait expires and with
    /// [`Error::InterruptedWait`] when the registry is closed while waiting.
    /// Neither failure leaves any trace in the registry.
    pub async fn acquire(&self, user_id: UserId) -> Result<KeyLockGuard> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(Error::InterruptedWait(user_id));
        }

        // Clone under the shard lock; see module docs.
        let lock = self.locks.lock_for(user_id);

        let started = Instant::now();
        let outcome = tokio::select! {
            guard = lock.lock_owned() => Ok(guard),
            _ = tokio::time::sleep(self.timeout) => Err(Error::LockTimeout {
                user_id,
                waited_ms: started.elapsed().as_millis() as u64,
            }),
            _ = closed.wait_for(|is_closed| *is_closed) => Err(Error::InterruptedWait(user_id)),
        };

        match outcome {
            Ok(guard) => Ok(KeyLockGuard {
                user_id,
                guard: Some(guard),
                locks: self.evict_idle.then(|| Arc::clone(&self.locks)),
            }),
            Err(err) => {
                if self.evict_idle {
                    self.locks.evict_if_idle(user_id);
                }
                tracing::warn!(user_id = %user_id, error = %err, "Lock acquisition failed");
                Err(err)
            }
        }
    }

    /// Release a held lock (same as dropping the guard)
    pub fn release(&self, guard: KeyLockGuard) {
        drop(guard);
    }

    /// Number of keys with a resident lock entry
    pub fn tracked_keys(&self) -> usize {
        self.locks.map.len()
    }

    /// Remove every entry no operation currently references
    pub fn evict_idle(&self) -> usize {
        self.locks.evict_all_idle()
    }

    /// Interrupt all pending waits and refuse new acquisitions
    ///
    /// Guards already held stay valid until dropped.
    pub fn close(&self) {
        self.closed.send_replace(true);
        tracing::info!(tracked_keys = self.locks.map.len(), "Lock registry closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl std::fmt::Debug for KeyLockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockRegistry")
            .field("tracked_keys", &self.locks.map.len())
            .field("timeout", &self.timeout)
            .field("evict_idle", &self.evict_idle)
            .finish()
    }
}

/// Exclusive hold on one user's lock; released on drop
pub struct KeyLockGuard {
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    // Present only when idle eviction is enabled
    locks: Option<Arc<LockTable>>,
}

impl KeyLockGuard {
    /// Key this guard protects
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        // Mutex guard (and its Arc) must go first so the count can reach 1.
        drop(self.guard.take());
        if let Some(locks) = self.locks.take() {
            locks.evict_if_idle(self.user_id);
        }
    }
}

impl std::fmt::Debug for KeyLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockGuard")
            .field("user_id", &self.user_id)
            .finish()
    }
}
