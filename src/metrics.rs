// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the flockdns controller.
//!
//! This module provides metrics collection with the namespace prefix
//! `flockdns_`.
//!
//! # Metrics Categories
//!
//! - **Lifecycle Metrics** - Track lifecycle event handling and outcomes
//! - **Reconciliation Metrics** - Track reconciliation runs per scaling group
//! - **DNS Change Metrics** - Track applied record changes
//! - **Gating Metrics** - Track readiness and health check outcomes
//! - **Lock Metrics** - Track lock contention

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all flockdns metrics
const METRICS_NAMESPACE: &str = "flockdns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Total number of handled lifecycle events by transition and outcome
///
/// Labels:
/// - `transition`: Lifecycle transition (`LAUNCHING`, `DRAINING`, ...)
/// - `outcome`: Outcome (`continue`, `abandon`, `error`)
pub static LIFECYCLE_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_lifecycle_events_total"),
        "Total number of handled lifecycle events by transition and outcome",
    );
    let counter = CounterVec::new(opts, &["transition", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of lifecycle event handling in seconds
///
/// Labels:
/// - `transition`: Lifecycle transition
pub static LIFECYCLE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_lifecycle_duration_seconds"),
        "Duration of lifecycle event handling in seconds by transition",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["transition"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of scaling-group reconciliation runs by outcome
///
/// Labels:
/// - `outcome`: Outcome (`success`, `error`)
pub static RECONCILIATION_RUNS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_runs_total"),
        "Total number of scaling-group reconciliation runs by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of per-group reconciliation runs in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of per-group reconciliation runs in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["group"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// DNS Change Metrics
// ============================================================================

/// Total number of applied DNS changes by action
///
/// Labels:
/// - `action`: Change action (`CREATE`, `UPDATE`, `DELETE`)
pub static DNS_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_changes_total"),
        "Total number of applied DNS changes by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Gating Metrics
// ============================================================================

/// Total number of readiness checks by outcome
///
/// Labels:
/// - `outcome`: Outcome (`ready`, `not_ready`)
pub static READINESS_CHECKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_readiness_checks_total"),
        "Total number of readiness checks by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of health checks by outcome
///
/// Labels:
/// - `outcome`: Outcome (`healthy`, `unhealthy`)
pub static HEALTH_CHECKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_health_checks_total"),
        "Total number of health checks by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Lock Metrics
// ============================================================================

/// Total number of lock acquisitions that exhausted their attempts
pub static LOCK_CONTENTION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_lock_contention_total"),
        "Total number of lock acquisitions that exhausted their attempts",
    );
    let counter = CounterVec::new(opts, &["resource"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a handled lifecycle event
///
/// # Arguments
/// * `transition` - The lifecycle transition handled
/// * `outcome` - Outcome label (`continue`, `abandon`, `error`)
/// * `duration` - Duration of the handling
pub fn record_lifecycle_event(transition: &str, outcome: &str, duration: Duration) {
    LIFECYCLE_EVENTS_TOTAL
        .with_label_values(&[transition, outcome])
        .inc();
    LIFECYCLE_DURATION_SECONDS
        .with_label_values(&[transition])
        .observe(duration.as_secs_f64());
}

/// Record a per-group reconciliation run
///
/// # Arguments
/// * `group` - The scaling group reconciled
/// * `success` - Whether the run completed without error
/// * `duration` - Duration of the run
pub fn record_reconciliation_run(group: &str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "error" };
    RECONCILIATION_RUNS_TOTAL
        .with_label_values(&[outcome])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[group])
        .observe(duration.as_secs_f64());
}

/// Record an applied DNS change
///
/// # Arguments
/// * `action` - The applied change action
pub fn record_change_applied(action: &str) {
    DNS_CHANGES_TOTAL.with_label_values(&[action]).inc();
}

/// Record a readiness check outcome
pub fn record_readiness_check(ready: bool) {
    let outcome = if ready { "ready" } else { "not_ready" };
    READINESS_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a health check outcome
pub fn record_health_check(healthy: bool) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    HEALTH_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record an exhausted lock acquisition
///
/// # Arguments
/// * `resource` - The contended lock key
pub fn record_lock_contention(resource: &str) {
    LOCK_CONTENTION_TOTAL.with_label_values(&[resource]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
