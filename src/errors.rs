// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the flockdns controller.
//!
//! This module provides specialized error types for:
//! - Configuration loading and validation failures
//! - Downstream provider failures (KV store, DNS, instances, scaling groups)
//! - Distributed lock contention
//! - Business rule violations inside coordinators
//!
//! Provider errors are caught at the nearest coordinator boundary and
//! translated into a state-machine outcome; they are never rethrown past
//! the process entrypoints.

use thiserror::Error;

/// Errors caused by malformed or missing configuration.
///
/// These are fatal to the current invocation and map to HTTP 400 at the
/// entrypoints.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The configuration document is absent from the KV store
    #[error("Configuration document not found under key '{key}' in table '{table}'")]
    DocumentNotFound {
        /// KV table the document was looked up in
        table: String,
        /// Document key that was queried
        key: String,
    },

    /// The configuration document exists but is missing a required field
    #[error("Configuration document under key '{key}' has no '{field}' field")]
    MissingField {
        /// Document key that was queried
        key: String,
        /// The absent field
        field: String,
    },

    /// The stored config blob could not be decoded or parsed
    #[error("Failed to decode configuration: {reason}")]
    Decode {
        /// Explanation of the decode failure
        reason: String,
    },

    /// A required value is empty
    #[error("'{field}' is required for {context}")]
    EmptyField {
        /// Name of the empty field
        field: &'static str,
        /// Where the field was required
        context: String,
    },

    /// Record TTL outside the allowed range
    #[error("Invalid record TTL: {ttl} (allowed range 1..=604800)")]
    InvalidTtl {
        /// The offending TTL
        ttl: u32,
    },

    /// Health check port outside 1..=65535
    #[error("Invalid health check port: {port}")]
    InvalidPort {
        /// The offending port
        port: u32,
    },

    /// Health check timeout outside the allowed range
    #[error("Invalid health check timeout: {seconds}s (allowed range 1..=60)")]
    InvalidTimeout {
        /// The offending timeout in seconds
        seconds: u64,
    },

    /// HTTP(S) health check enabled without a path
    #[error("Health check path is required when HTTP(S) health check is enabled")]
    MissingHealthCheckPath,

    /// Record type not allowed to carry multiple values
    #[error("Record type '{record_type}' does not support MULTIVALUE mode")]
    UnsupportedMultivalueType {
        /// The offending record type
        record_type: String,
    },
}

/// Errors raised by downstream providers (KV store, DNS zone API,
/// compute API, scaling-group API).
///
/// Each variant carries enough context to identify the backend call that
/// failed. These are fatal to the current record operation only.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// KV repository call failure
    #[error("Repository {operation} failed for key '{key}': {reason}")]
    Repository {
        /// The repository operation (get, create, put, delete)
        operation: &'static str,
        /// Key involved in the call
        key: String,
        /// Underlying cause
        reason: String,
    },

    /// DNS zone API call failure
    #[error("DNS {operation} failed for zone '{zone_id}': {reason}")]
    Dns {
        /// The DNS operation (zone_name, read_record, apply_batch)
        operation: &'static str,
        /// Zone the call targeted
        zone_id: String,
        /// Underlying cause
        reason: String,
    },

    /// Compute/instance API call failure
    #[error("Instance {operation} failed for '{instance_id}': {reason}")]
    Instance {
        /// The instance operation (describe)
        operation: &'static str,
        /// Instance the call targeted
        instance_id: String,
        /// Underlying cause
        reason: String,
    },

    /// Scaling-group API call failure
    #[error("Scaling group {operation} failed for '{group}': {reason}")]
    ScalingGroup {
        /// The scaling-group operation (list_instances, complete_lifecycle_action)
        operation: &'static str,
        /// Scaling group the call targeted
        group: String,
        /// Underlying cause
        reason: String,
    },

    /// The configured provider has no adapter wired into this build
    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider {
        /// The requested provider name
        provider: String,
    },
}

impl ProviderError {
    /// Returns true if this error is transient and the call may be retried
    /// in-process.
    ///
    /// Selecting an unsupported provider is a deployment mistake and is never
    /// retried; everything else is assumed to be a transient backend failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::UnsupportedProvider { .. })
    }
}

/// Composite error type for all controller operations.
///
/// This is the primary error type returned by coordinator and planner
/// functions. It provides a unified interface for mapping failures to
/// entrypoint responses and state-machine outcomes.
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// Configuration loading or validation failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Downstream provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Bounded-attempt lock acquisition exhausted without success
    #[error("Failed to acquire lock for resource '{resource_id}' after {attempts} attempts")]
    LockContention {
        /// Lock key that stayed contended
        resource_id: String,
        /// Number of acquire attempts made
        attempts: u32,
    },

    /// Invariant violation inside a coordinator
    #[error("Business rule violation: {0}")]
    Business(String),
}

impl DiscoveryError {
    /// HTTP status code this error maps to at the process entrypoints.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 400,
            Self::Provider(_) | Self::LockContention { .. } | Self::Business(_) => 500,
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
