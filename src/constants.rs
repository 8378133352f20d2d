// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the flockdns controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Record Constants
// ============================================================================

/// Minimum allowed record TTL in seconds
pub const RECORD_TTL_MIN_SECS: u32 = 1;

/// Maximum allowed record TTL in seconds (7 days)
pub const RECORD_TTL_MAX_SECS: u32 = 604_800;

/// Default TTL for DNS records (1 minute)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 60;

/// Default record type when a config omits one
pub const DEFAULT_RECORD_TYPE: &str = "A";

/// Default placeholder value written to managed records that would
/// otherwise become empty
pub const DEFAULT_MOCK_VALUE: &str = "1.0.0.217";

/// Record types that may carry more than one value in `MULTIVALUE` mode
pub const MULTIVALUE_RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "MX", "TXT", "PTR", "SRV", "SPF", "NAPTR", "CAA",
];

/// Default value source for record values
pub const DEFAULT_VALUE_SOURCE: &str = "ip:private";

// ============================================================================
// Scaling Group Constants
// ============================================================================

/// Default lifecycle state an instance must be in to contribute to a record
pub const DEFAULT_VALID_STATE: &str = "InService";

/// Event name carried by provider test notifications
pub const TEST_NOTIFICATION_EVENT: &str = "autoscaling:TEST_NOTIFICATION";

// ============================================================================
// Distributed Lock Constants
// ============================================================================

/// Maximum number of attempts made by the bounded-attempt lock acquire
pub const LOCK_MAX_ATTEMPTS: u32 = 10;

// ============================================================================
// Readiness Defaults
// ============================================================================

/// Default interval between readiness tag polls
pub const DEFAULT_READINESS_INTERVAL_SECS: u64 = 5;

/// Default total time budget for a readiness wait
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 300;

/// Default tag key checked for readiness
pub const DEFAULT_READINESS_TAG_KEY: &str = "app:code-deploy:status";

/// Default tag value checked for readiness
pub const DEFAULT_READINESS_TAG_VALUE: &str = "success";

// ============================================================================
// Health Check Defaults
// ============================================================================

/// Default health check timeout
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

/// Default health check endpoint source
pub const DEFAULT_HEALTH_ENDPOINT_SOURCE: &str = "ip:private";

// ============================================================================
// Configuration Document Constants
// ============================================================================

/// Field of the stored configuration document that holds the
/// base64-encoded config array
pub const CONFIG_DOCUMENT_FIELD: &str = "config";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the HTTP server
pub const SERVER_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Default bulk reconciliation concurrency when unset
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
