//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the registry. Each [`Metrics`] owns its
//! own registry so several registries can live in one process.
//!
//! # Metrics
//!
//! - `freight_operations_total{operation, outcome}` - Operations by result
//!   (`ok` or the error kind)
//! - `freight_capacity_reserved_total` - Capacity units reserved by orders
//! - `freight_compensations_total` - Sagas that ran their compensations
//! - `freight_compensation_failures_total` - Compensations that failed

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Operations by name and outcome
    pub operations: IntCounterVec,

    /// Capacity units reserved
    pub capacity_reserved: IntCounter,

    /// Sagas compensated
    pub compensations: IntCounter,

    /// Compensations that failed
    pub compensation_failures: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations = IntCounterVec::new(
            Opts::new("freight_operations_total", "Registry operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        let capacity_reserved = IntCounter::new(
            "freight_capacity_reserved_total",
            "Capacity units reserved by orders",
        )?;
        registry.register(Box::new(capacity_reserved.clone()))?;

        let compensations = IntCounter::new(
            "freight_compensations_total",
            "Sagas that ran their compensations",
        )?;
        registry.register(Box::new(compensations.clone()))?;

        let compensation_failures = IntCounter::new(
            "freight_compensation_failures_total",
            "Compensations that failed",
        )?;
        registry.register(Box::new(compensation_failures.clone()))?;

        Ok(Self {
            operations,
            capacity_reserved,
            compensations,
            compensation_failures,
            registry,
        })
    }

    /// Count one finished operation
    pub fn record<T>(&self, operation: &str, result: &crate::Result<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(err) => err.kind_label(),
        };
        self.operations
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Count of `operation` finished with `outcome`
    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations
            .with_label_values(&[operation, outcome])
            .get()
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %err, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
