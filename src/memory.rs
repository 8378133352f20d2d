// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory provider implementations.
//!
//! These back the `mock` cloud provider used for local development and are
//! the providers the test suite runs against. State lives in process memory
//! behind mutexes; the seeding helpers (`add_zone`, `add_instance`, ...) are
//! part of the public surface so a dev environment can be scripted.

use crate::change::{BatchAction, ChangeBatch, RecordSet};
use crate::errors::ProviderError;
use crate::event::{LifecycleAction, LifecycleEvent};
use crate::providers::{DnsProvider, InstanceDescriptor, InstanceProvider, ScalingGroupProvider};
use crate::repository::Repository;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory KV repository.
#[derive(Default)]
pub struct MemoryRepository {
    rows: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ProviderError> {
        Ok(self.rows.lock().expect("repository poisoned").get(key).cloned())
    }

    async fn create(
        &self,
        key: &str,
        item: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, ProviderError> {
        let mut rows = self.rows.lock().expect("repository poisoned");
        if rows.contains_key(key) {
            return Ok(None);
        }
        rows.insert(key.to_string(), item.clone());
        Ok(Some(item))
    }

    async fn put(&self, key: &str, item: serde_json::Value) -> Result<(), ProviderError> {
        self.rows
            .lock()
            .expect("repository poisoned")
            .insert(key.to_string(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, ProviderError> {
        Ok(self
            .rows
            .lock()
            .expect("repository poisoned")
            .remove(key)
            .is_some())
    }
}

struct MemoryZone {
    name: String,
    records: BTreeMap<(String, String), RecordSet>,
}

/// In-memory DNS provider.
///
/// Zones must be registered with [`MemoryDnsProvider::add_zone`] before
/// records can be read or written; an unknown zone surfaces as a provider
/// error, like a real backend would.
#[derive(Default)]
pub struct MemoryDnsProvider {
    zones: Mutex<HashMap<String, MemoryZone>>,
}

impl MemoryDnsProvider {
    /// Create a provider with no zones.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone under an id with its apex name.
    pub fn add_zone(&self, zone_id: &str, zone_name: &str) {
        self.zones.lock().expect("zones poisoned").insert(
            zone_id.to_string(),
            MemoryZone {
                name: zone_name.trim_end_matches('.').to_string(),
                records: BTreeMap::new(),
            },
        );
    }

    /// Seed a record set into a zone, bypassing the change pipeline.
    pub fn seed_record(&self, zone_id: &str, record: RecordSet) {
        let mut zones = self.zones.lock().expect("zones poisoned");
        if let Some(zone) = zones.get_mut(zone_id) {
            zone.records.insert(
                (record.name.clone(), record.record_type.clone()),
                record,
            );
        }
    }

    /// Snapshot one record set, if present.
    #[must_use]
    pub fn record(&self, zone_id: &str, name: &str, record_type: &str) -> Option<RecordSet> {
        self.zones
            .lock()
            .expect("zones poisoned")
            .get(zone_id)
            .and_then(|zone| {
                zone.records
                    .get(&(name.to_string(), record_type.to_string()))
                    .cloned()
            })
    }
}

#[async_trait]
impl DnsProvider for MemoryDnsProvider {
    async fn zone_name(&self, zone_id: &str) -> Result<String, ProviderError> {
        self.zones
            .lock()
            .expect("zones poisoned")
            .get(zone_id)
            .map(|zone| zone.name.clone())
            .ok_or_else(|| ProviderError::Dns {
                operation: "zone_name",
                zone_id: zone_id.to_string(),
                reason: "zone not found".to_string(),
            })
    }

    async fn read_record(
        &self,
        zone_id: &str,
        record_name: &str,
        record_type: &str,
    ) -> Result<Option<RecordSet>, ProviderError> {
        let zones = self.zones.lock().expect("zones poisoned");
        let zone = zones.get(zone_id).ok_or_else(|| ProviderError::Dns {
            operation: "read_record",
            zone_id: zone_id.to_string(),
            reason: "zone not found".to_string(),
        })?;
        Ok(zone
            .records
            .get(&(record_name.to_string(), record_type.to_string()))
            .cloned())
    }

    async fn apply_batch(&self, zone_id: &str, batch: &ChangeBatch) -> Result<(), ProviderError> {
        let mut zones = self.zones.lock().expect("zones poisoned");
        let zone = zones.get_mut(zone_id).ok_or_else(|| ProviderError::Dns {
            operation: "apply_batch",
            zone_id: zone_id.to_string(),
            reason: "zone not found".to_string(),
        })?;
        for change in &batch.changes {
            let key = (
                change.record.name.clone(),
                change.record.record_type.clone(),
            );
            match change.action {
                BatchAction::Upsert => {
                    zone.records.insert(key, change.record.clone());
                }
                BatchAction::Delete => {
                    zone.records.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// In-memory compute and scaling-group provider.
#[derive(Default)]
pub struct MemoryCloudProvider {
    instances: Mutex<HashMap<String, InstanceDescriptor>>,
    groups: Mutex<HashMap<String, Vec<String>>>,
    completed: Mutex<Vec<(String, &'static str)>>,
}

impl MemoryCloudProvider {
    /// Create a provider with no instances.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance, optionally as a member of a scaling group.
    pub fn add_instance(&self, instance: InstanceDescriptor, group: Option<&str>) {
        if let Some(group) = group {
            self.groups
                .lock()
                .expect("groups poisoned")
                .entry(group.to_string())
                .or_default()
                .push(instance.instance_id.clone());
        }
        self.instances
            .lock()
            .expect("instances poisoned")
            .insert(instance.instance_id.clone(), instance);
    }

    /// Set a tag on an existing instance. Subsequent describes observe the
    /// new tag, which is how readiness polling is exercised.
    pub fn set_tag(&self, instance_id: &str, key: &str, value: &str) {
        if let Some(instance) = self
            .instances
            .lock()
            .expect("instances poisoned")
            .get_mut(instance_id)
        {
            instance.tags.insert(key.to_string(), value.to_string());
        }
    }

    /// Lifecycle actions acknowledged so far, as `(instance_id, action)`.
    #[must_use]
    pub fn completed_actions(&self) -> Vec<(String, &'static str)> {
        self.completed.lock().expect("completed poisoned").clone()
    }
}

#[async_trait]
impl InstanceProvider for MemoryCloudProvider {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescriptor>, ProviderError> {
        Ok(self
            .instances
            .lock()
            .expect("instances poisoned")
            .get(instance_id)
            .cloned())
    }
}

#[async_trait]
impl ScalingGroupProvider for MemoryCloudProvider {
    async fn list_instances(
        &self,
        group: &str,
        lifecycle_states: &[String],
    ) -> Result<Vec<InstanceDescriptor>, ProviderError> {
        let groups = self.groups.lock().expect("groups poisoned");
        let instances = self.instances.lock().expect("instances poisoned");
        let members = groups.get(group).cloned().unwrap_or_default();
        Ok(members
            .iter()
            .filter_map(|id| instances.get(id))
            .filter(|instance| lifecycle_states.contains(&instance.lifecycle_state))
            .cloned()
            .collect())
    }

    async fn complete_lifecycle_action(
        &self,
        event: &LifecycleEvent,
        action: LifecycleAction,
    ) -> Result<(), ProviderError> {
        self.completed
            .lock()
            .expect("completed poisoned")
            .push((event.instance_id.clone(), action.as_str()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
