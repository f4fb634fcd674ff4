//! Metrics collection for observability
//!
//! Each ledger owns its own Prometheus registry, so several ledgers (or
//! tests) can live in one process without colliding on metric names.
//!
//! # Metrics
//!
//! - `point_charges_total` - Committed charges
//! - `point_uses_total` - Committed uses
//! - `point_rejections_total` - Requests rejected by validation
//! - `point_lock_timeouts_total` - Lock acquisitions that hit the bounded wait
//! - `point_history_failures_total` - Balances committed without a record
//! - `point_lock_wait_seconds` - Histogram of lock wait latencies
//! - `point_tracked_locks` - Resident per-user lock entries

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed charges
    pub charges_total: IntCounter,

    /// Committed uses
    pub uses_total: IntCounter,

    /// Validation rejections
    pub rejections_total: IntCounter,

    /// Lock timeouts
    pub lock_timeouts_total: IntCounter,

    /// History append failures after a committed balance
    pub history_failures_total: IntCounter,

    /// Lock wait histogram
    pub lock_wait: Histogram,

    /// Resident lock entries
    pub tracked_locks: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let charges_total = IntCounter::new("point_charges_total", "Committed charges")?;
        registry.register(Box::new(charges_total.clone()))?;

        let uses_total = IntCounter::new("point_uses_total", "Committed uses")?;
        registry.register(Box::new(uses_total.clone()))?;

        let rejections_total = IntCounter::new(
            "point_rejections_total",
            "Requests rejected by validation",
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let lock_timeouts_total = IntCounter::new(
            "point_lock_timeouts_total",
            "Lock acquisitions that hit the bounded wait",
        )?;
        registry.register(Box::new(lock_timeouts_total.clone()))?;

        let history_failures_total = IntCounter::new(
            "point_history_failures_total",
            "Balances committed without a history record",
        )?;
        registry.register(Box::new(history_failures_total.clone()))?;

        let lock_wait = Histogram::with_opts(
            HistogramOpts::new("point_lock_wait_seconds", "Histogram of lock wait latencies")
                .buckets(vec![0.0001, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0, 10.0]),
        )?;
        registry.register(Box::new(lock_wait.clone()))?;

        let tracked_locks = IntGauge::new("point_tracked_locks", "Resident per-user lock entries")?;
        registry.register(Box::new(tracked_locks.clone()))?;

        Ok(Self {
            charges_total,
            uses_total,
            rejections_total,
            lock_timeouts_total,
            history_failures_total,
            lock_wait,
            tracked_locks,
            registry,
        })
    }

    /// Record lock wait duration
    pub fn record_lock_wait(&self, duration_seconds: f64) {
        self.lock_wait.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Metrics(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("charges_total", &self.charges_total.get())
            .field("uses_total", &self.uses_total.get())
            .field("rejections_total", &self.rejections_total.get())
            .field("lock_timeouts_total", &self.lock_timeouts_total.get())
            .finish()
    }
}
