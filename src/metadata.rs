// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Instance metadata resolution.
//!
//! Maps a `{scaling group config, lifecycle event}` pair to the list of
//! values the DNS record should be filled from. The value source grammar is
//! `kind:arg`: `ip:public`, `ip:private`, or `tag:<key>`. Parsing is total;
//! unknown kinds resolve to an empty set rather than an error.

use crate::config::ScalingGroupConfig;
use crate::errors::ProviderError;
use crate::event::{LifecycleEvent, LifecycleTransition};
use crate::providers::{InstanceDescriptor, InstanceProvider, ScalingGroupProvider};
use std::sync::Arc;

/// Which IP address of an instance to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpKind {
    /// The instance's public address
    Public,
    /// The instance's private address
    Private,
}

/// Parsed `kind:arg` value source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// One of the instance's IP addresses
    Ip(IpKind),
    /// The value of an instance tag
    Tag(String),
    /// Anything that did not parse; resolves to no values
    Unknown,
}

impl ValueSource {
    /// Parse a `kind:arg` source string. Total: unknown kinds or malformed
    /// strings yield [`ValueSource::Unknown`].
    #[must_use]
    pub fn parse(source: &str) -> Self {
        match source.split_once(':') {
            Some(("ip", "public")) => Self::Ip(IpKind::Public),
            Some(("ip", "private")) => Self::Ip(IpKind::Private),
            Some(("tag", key)) if !key.is_empty() => Self::Tag(key.to_string()),
            _ => Self::Unknown,
        }
    }

    /// Source string as carried on resolved values.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Ip(IpKind::Public) => "ip:public".to_string(),
            Self::Ip(IpKind::Private) => "ip:private".to_string(),
            Self::Tag(key) => format!("tag:{key}"),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

/// Extract the source's value from one instance.
///
/// Returns `None` when the instance does not carry the requested address or
/// tag, in which case it simply does not contribute to the record.
#[must_use]
pub fn value_from_instance(instance: &InstanceDescriptor, source: &ValueSource) -> Option<String> {
    match source {
        ValueSource::Ip(IpKind::Public) => instance.public_ip.clone(),
        ValueSource::Ip(IpKind::Private) => instance.private_ip.clone(),
        ValueSource::Tag(key) => instance.tags.get(key).cloned(),
        ValueSource::Unknown => None,
    }
}

/// One resolved contribution to a record's value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataValue {
    /// Instance the value came from
    pub instance_id: String,
    /// Instance launch time as a unix timestamp
    pub launch_ts: i64,
    /// The resolved record value
    pub value: String,
    /// Source label the value was resolved through
    pub source: String,
}

/// Resolves record values from instance metadata.
#[derive(Clone)]
pub struct MetadataResolver {
    instances: Arc<dyn InstanceProvider>,
    scaling_groups: Arc<dyn ScalingGroupProvider>,
}

impl MetadataResolver {
    /// Create a resolver over the instance and scaling-group providers.
    #[must_use]
    pub fn new(
        instances: Arc<dyn InstanceProvider>,
        scaling_groups: Arc<dyn ScalingGroupProvider>,
    ) -> Self {
        Self {
            instances,
            scaling_groups,
        }
    }

    /// Resolve the contributing values for a config and event.
    ///
    /// Instance selection by transition:
    ///
    /// | transition | instances |
    /// |---|---|
    /// | LAUNCHING / DRAINING | exactly the event's instance |
    /// | RECONCILING | all group members in a valid lifecycle state |
    /// | otherwise | none |
    ///
    /// Results are ordered by launch time ascending, then instance id.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when an instance or scaling-group call
    /// fails. A LAUNCHING/DRAINING event whose instance no longer exists
    /// resolves to an empty set.
    pub async fn resolve(
        &self,
        config: &ScalingGroupConfig,
        event: &LifecycleEvent,
    ) -> Result<Vec<MetadataValue>, ProviderError> {
        let instances = match event.transition {
            LifecycleTransition::Launching | LifecycleTransition::Draining => self
                .instances
                .describe_instance(&event.instance_id)
                .await?
                .into_iter()
                .collect(),
            LifecycleTransition::Reconciling => {
                self.scaling_groups
                    .list_instances(
                        &config.scaling_group_name,
                        &config.scaling_group_valid_states,
                    )
                    .await?
            }
            LifecycleTransition::Unrelated => Vec::new(),
        };
        Ok(Self::resolve_from_instances(config, &instances))
    }

    /// Resolve values from an already-enumerated instance set.
    ///
    /// Used by the reconciliation workers, which list and filter instances
    /// themselves (readiness, health) before planning.
    #[must_use]
    pub fn resolve_from_instances(
        config: &ScalingGroupConfig,
        instances: &[InstanceDescriptor],
    ) -> Vec<MetadataValue> {
        let source = ValueSource::parse(&config.dns_config.value_source);
        let mut values: Vec<MetadataValue> = instances
            .iter()
            .filter_map(|instance| {
                value_from_instance(instance, &source).map(|value| MetadataValue {
                    instance_id: instance.instance_id.clone(),
                    launch_ts: instance.launch_time.timestamp(),
                    value,
                    source: source.label(),
                })
            })
            .collect();
        values.sort_by(|a, b| {
            a.launch_ts
                .cmp(&b.launch_ts)
                .then_with(|| a.instance_id.cmp(&b.instance_id))
        });
        values
    }
}

/// Flatten resolved metadata into plain record values, preserving order.
#[must_use]
pub fn values_of(resolved: &[MetadataValue]) -> Vec<String> {
    resolved.iter().map(|m| m.value.clone()).collect()
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod metadata_tests;
