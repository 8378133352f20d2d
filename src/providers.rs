// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud provider seams.
//!
//! The core consumes cloud backends exclusively through these traits: a DNS
//! zone API, a compute/instance API, and a scaling-group API. Concrete
//! adapters (the in-memory ones in [`crate::memory`], or SDK-backed ones in a
//! deployment build) are wired once at startup and passed down as trait
//! objects.

use crate::change::{ChangeBatch, RecordSet};
use crate::errors::ProviderError;
use crate::event::{LifecycleAction, LifecycleEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A compute instance as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescriptor {
    /// Provider instance id
    pub instance_id: String,
    /// When the instance was launched
    pub launch_time: DateTime<Utc>,
    /// Public IP address, when one is attached
    pub public_ip: Option<String>,
    /// Private IP address
    pub private_ip: Option<String>,
    /// Instance tags
    pub tags: BTreeMap<String, String>,
    /// Scaling-group lifecycle state (`InService`, `Terminating`, ...)
    pub lifecycle_state: String,
}

impl InstanceDescriptor {
    /// True when the instance carries the given tag pair.
    #[must_use]
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }
}

/// DNS zone API.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Apex name of a zone, without trailing dot.
    async fn zone_name(&self, zone_id: &str) -> Result<String, ProviderError>;

    /// Read one record set; `None` when the record does not exist.
    async fn read_record(
        &self,
        zone_id: &str,
        record_name: &str,
        record_type: &str,
    ) -> Result<Option<RecordSet>, ProviderError>;

    /// Apply a change batch to a zone.
    ///
    /// Implementations that expose a propagation waiter return only once the
    /// change is acknowledged.
    async fn apply_batch(&self, zone_id: &str, batch: &ChangeBatch) -> Result<(), ProviderError>;
}

/// Compute/instance API.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    /// Describe one instance; `None` when it does not exist. Each call
    /// returns a fresh tag snapshot.
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescriptor>, ProviderError>;
}

/// Scaling-group API.
#[async_trait]
pub trait ScalingGroupProvider: Send + Sync {
    /// List the group's instances whose lifecycle state is in
    /// `lifecycle_states`.
    async fn list_instances(
        &self,
        group: &str,
        lifecycle_states: &[String],
    ) -> Result<Vec<InstanceDescriptor>, ProviderError>;

    /// Acknowledge a pending lifecycle action with CONTINUE or ABANDON.
    async fn complete_lifecycle_action(
        &self,
        event: &LifecycleEvent,
        action: LifecycleAction,
    ) -> Result<(), ProviderError>;
}
