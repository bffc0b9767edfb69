//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `custom_secret_reconciliations_total` - Total number of reconciliation passes
//! - `custom_secret_reconciliation_errors_total` - Total number of failed passes
//! - `custom_secret_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `custom_secret_pass_outcomes_total{state}` - Completed passes by resulting state
//! - `custom_secret_credentials_created_total` - Credentials created
//! - `custom_secret_credentials_rotated_total` - Credentials rotated in place
//! - `custom_secret_generation_errors_total` - Secret generation failures
//! - `custom_secret_requeues_total{reason}` - Requeues requested, by reason

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "custom_secret_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "custom_secret_reconciliation_errors_total",
        "Total number of reconciliation passes that failed",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "custom_secret_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static PASS_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "custom_secret_pass_outcomes_total",
            "Completed reconciliation passes by resulting state",
        ),
        &["state"],
    )
    .expect("Failed to create PASS_OUTCOMES_TOTAL metric - this should never happen")
});

static CREDENTIALS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "custom_secret_credentials_created_total",
        "Total number of managed credentials created",
    )
    .expect("Failed to create CREDENTIALS_CREATED_TOTAL metric - this should never happen")
});

static CREDENTIALS_ROTATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "custom_secret_credentials_rotated_total",
        "Total number of managed credentials rotated in place",
    )
    .expect("Failed to create CREDENTIALS_ROTATED_TOTAL metric - this should never happen")
});

static GENERATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "custom_secret_generation_errors_total",
        "Total number of secret generation failures",
    )
    .expect("Failed to create GENERATION_ERRORS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "custom_secret_requeues_total",
            "Total number of requeues requested, by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register every metric with the process registry
///
/// Fails if called twice.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PASS_OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIALS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIALS_ROTATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GENERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_pass_outcome(state: &str) {
    PASS_OUTCOMES_TOTAL.with_label_values(&[state]).inc();
}

pub fn increment_credentials_created() {
    CREDENTIALS_CREATED_TOTAL.inc();
}

pub fn increment_credentials_rotated() {
    CREDENTIALS_ROTATED_TOTAL.inc();
}

pub fn increment_generation_errors() {
    GENERATION_ERRORS_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = CREDENTIALS_CREATED_TOTAL.get();
        increment_credentials_created();
        assert_eq!(CREDENTIALS_CREATED_TOTAL.get(), before + 1);

        let before = PASS_OUTCOMES_TOTAL.with_label_values(&["current"]).get();
        increment_pass_outcome("current");
        assert_eq!(
            PASS_OUTCOMES_TOTAL.with_label_values(&["current"]).get(),
            before + 1
        );
    }

    #[test]
    fn test_requeue_reasons_are_separate_series() {
        let precise = REQUEUES_TOTAL.with_label_values(&["rotation-pending"]).get();
        let backoff = REQUEUES_TOTAL.with_label_values(&["error-backoff"]).get();
        increment_requeues_total("error-backoff");
        assert_eq!(
            REQUEUES_TOTAL.with_label_values(&["rotation-pending"]).get(),
            precise
        );
        assert_eq!(
            REQUEUES_TOTAL.with_label_values(&["error-backoff"]).get(),
            backoff + 1
        );
    }
}
