//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_deposits_total` - Total successful deposits
//! - `ledger_reservations_total` - Total successful reservations
//! - `ledger_recognitions_total` - Total recognized transactions
//! - `ledger_cancellations_total` - Total cancelled reservations
//! - `ledger_rejections_total` - Total rejected operations (any error)
//! - `ledger_operation_duration_seconds` - Histogram of operation latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Counters live in a per-instance registry (not the process-global one) so
/// multiple ledgers can coexist in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Total successful deposits
    pub deposits_total: IntCounter,

    /// Total successful reservations
    pub reservations_total: IntCounter,

    /// Total recognized transactions
    pub recognitions_total: IntCounter,

    /// Total cancelled reservations
    pub cancellations_total: IntCounter,

    /// Total rejected operations
    pub rejections_total: IntCounter,

    /// Operation duration histogram
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deposits_total =
            IntCounter::new("ledger_deposits_total", "Total successful deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let reservations_total =
            IntCounter::new("ledger_reservations_total", "Total successful reservations")?;
        registry.register(Box::new(reservations_total.clone()))?;

        let recognitions_total =
            IntCounter::new("ledger_recognitions_total", "Total recognized transactions")?;
        registry.register(Box::new(recognitions_total.clone()))?;

        let cancellations_total =
            IntCounter::new("ledger_cancellations_total", "Total cancelled reservations")?;
        registry.register(Box::new(cancellations_total.clone()))?;

        let rejections_total =
            IntCounter::new("ledger_rejections_total", "Total rejected operations")?;
        registry.register(Box::new(rejections_total.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            deposits_total,
            reservations_total,
            recognitions_total,
            cancellations_total,
            rejections_total,
            operation_duration,
            registry,
        })
    }

    /// Record a successful deposit
    pub fn record_deposit(&self) {
        self.deposits_total.inc();
    }

    /// Record a successful reservation
    pub fn record_reservation(&self) {
        self.reservations_total.inc();
    }

    /// Record a recognized transaction
    pub fn record_recognition(&self) {
        self.recognitions_total.inc();
    }

    /// Record a cancelled reservation
    pub fn record_cancellation(&self) {
        self.cancellations_total.inc();
    }

    /// Record a rejected operation
    pub fn record_rejection(&self) {
        self.rejections_total.inc();
    }

    /// Record operation duration
    pub fn record_operation_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
