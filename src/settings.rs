// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process settings resolved from environment variables.
//!
//! Settings are read once at startup by [`Settings::from_env`] and threaded
//! through the application context; no mutable globals. Every variable has a
//! default, so an empty environment yields a usable (mock-provider)
//! configuration.

use crate::config::ReadinessConfig;
use crate::constants::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_READINESS_INTERVAL_SECS, DEFAULT_READINESS_TAG_KEY,
    DEFAULT_READINESS_TAG_VALUE, DEFAULT_READINESS_TIMEOUT_SECS,
};

/// KV store binding.
#[derive(Debug, Clone)]
pub struct DbSettings {
    /// Backing store kind (`dynamodb`, `memory`, ...)
    pub provider: String,
    /// Table holding lock rows and the configuration document
    pub table_name: String,
    /// Key of the configuration document
    pub config_item_key_id: String,
}

/// Bulk reconciliation tunables.
#[derive(Debug, Clone)]
pub struct ReconciliationSettings {
    /// When true, planned changes are logged and never applied
    pub what_if: bool,
    /// Upper bound on concurrently reconciling scaling groups
    pub max_concurrency: usize,
}

/// Telemetry settings.
///
/// Alarm policy itself is owned elsewhere; the destination is only carried
/// here so it can be surfaced to the operator.
#[derive(Debug, Clone)]
pub struct MetricsSettings {
    /// Whether metric recording is enabled
    pub enabled: bool,
    /// Metrics backend (`prometheus`, `cloudwatch`, ...)
    pub provider: String,
    /// Namespace metric names are prefixed with
    pub namespace: String,
    /// Whether alarms are provisioned for this deployment
    pub alarms_enabled: bool,
    /// Notification destination for alarm events
    pub alarms_notification_destination: String,
}

/// All environment-derived process settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Cloud backend the provider adapters are built for
    pub cloud_provider: String,
    /// KV store binding
    pub db: DbSettings,
    /// Readiness defaults applied when a config carries no readiness block
    pub readiness: ReadinessConfig,
    /// Bulk reconciliation tunables
    pub reconciliation: ReconciliationSettings,
    /// Telemetry settings
    pub metrics: MetricsSettings,
    /// Identifier stamped on log lines
    pub log_identifier: String,
}

impl Settings {
    /// Read all settings from the process environment.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cloud_provider: env_string("cloud_provider", "mock"),
            db: DbSettings {
                provider: env_string("db_provider", "memory"),
                table_name: env_string("db_table_name", ""),
                config_item_key_id: env_string("db_config_item_key_id", ""),
            },
            readiness: ReadinessConfig {
                enabled: env_bool("ec2_readiness_enabled", true),
                interval_seconds: env_u64(
                    "ec2_readiness_interval_seconds",
                    DEFAULT_READINESS_INTERVAL_SECS,
                ),
                timeout_seconds: env_u64(
                    "ec2_readiness_timeout_seconds",
                    DEFAULT_READINESS_TIMEOUT_SECS,
                ),
                tag_key: env_string("ec2_readiness_tag_key", DEFAULT_READINESS_TAG_KEY),
                tag_value: env_string("ec2_readiness_tag_value", DEFAULT_READINESS_TAG_VALUE),
            },
            reconciliation: ReconciliationSettings {
                what_if: env_bool("reconciliation_what_if", false),
                max_concurrency: env_u64(
                    "reconciliation_max_concurrency",
                    DEFAULT_MAX_CONCURRENCY as u64,
                )
                .max(1) as usize,
            },
            metrics: MetricsSettings {
                enabled: env_bool("monitoring_metrics_enabled", false),
                provider: env_string("monitoring_metrics_provider", "prometheus"),
                namespace: env_string("monitoring_metrics_namespace", ""),
                alarms_enabled: env_bool("monitoring_alarms_enabled", false),
                alarms_notification_destination: env_string(
                    "monitoring_alarms_notification_destination",
                    "",
                ),
            },
            log_identifier: env_string("log-identifier", "flockdns"),
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod settings_tests;
