// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-record change planning.
//!
//! The planner reads the record's current state, resolves the desired value
//! set from instance metadata, and emits a [`ChangeRequest`] describing how
//! to converge the record. Planning is idempotent: applying the emitted
//! change and replanning over the same inputs yields IGNORE.
//!
//! Transition rules:
//!
//! - **LAUNCHING** - the event's instance joins the value set. If its values
//!   are already present, IGNORE; otherwise the union of current and desired
//!   values (first desired value only in SINGLE mode).
//! - **DRAINING** - the event's instance leaves the value set. An emptied
//!   managed record is rewritten to its mock value, an emptied unmanaged
//!   record is deleted.
//! - **RECONCILING** - the record converges to exactly the live member set.

use crate::change::{ChangeAction, ChangeRequest};
use crate::config::{DnsRecordConfig, RecordMode, ScalingGroupConfig};
use crate::errors::{ConfigError, DiscoveryError};
use crate::event::{LifecycleEvent, LifecycleTransition};
use crate::metadata::{values_of, MetadataResolver};
use crate::providers::DnsProvider;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Normalize a record name to a fully qualified name inside a zone.
///
/// The trailing dot is stripped, and the zone apex is appended unless the
/// name already ends with it. The operation is idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize_record_name(record_name: &str, zone_name: &str) -> String {
    let name = record_name.trim_end_matches('.');
    let zone = zone_name.trim_end_matches('.');
    if name == zone || name.ends_with(&format!(".{zone}")) {
        name.to_string()
    } else {
        format!("{name}.{zone}")
    }
}

/// Plans DNS changes from current record state and resolved metadata.
#[derive(Clone)]
pub struct RecordPlanner {
    dns: Arc<dyn DnsProvider>,
    resolver: MetadataResolver,
}

impl RecordPlanner {
    /// Create a planner over the DNS provider and metadata resolver.
    #[must_use]
    pub fn new(dns: Arc<dyn DnsProvider>, resolver: MetadataResolver) -> Self {
        Self { dns, resolver }
    }

    /// Plan the change for one config and lifecycle event.
    ///
    /// Resolves the desired values through the metadata resolver, then
    /// delegates to [`RecordPlanner::plan_with_values`].
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when a provider call fails or the change
    /// request fails validation.
    pub async fn plan(
        &self,
        config: &ScalingGroupConfig,
        event: &LifecycleEvent,
    ) -> Result<ChangeRequest, DiscoveryError> {
        let resolved = self.resolver.resolve(config, event).await?;
        self.plan_with_values(config, event.transition, &values_of(&resolved))
            .await
    }

    /// Plan the change for one config from an already-resolved desired set.
    ///
    /// The reconciliation workers resolve and filter values themselves
    /// (readiness, health) and call this directly.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when a provider call fails or the change
    /// request fails validation.
    pub async fn plan_with_values(
        &self,
        config: &ScalingGroupConfig,
        transition: LifecycleTransition,
        desired: &[String],
    ) -> Result<ChangeRequest, DiscoveryError> {
        let dns_config = &config.dns_config;
        let zone_name = self.dns.zone_name(&dns_config.dns_zone_id).await?;
        let record_name = normalize_record_name(&dns_config.record_name, &zone_name);
        let record = self
            .dns
            .read_record(&dns_config.dns_zone_id, &record_name, &dns_config.record_type)
            .await?;
        let current = current_values(dns_config, record.as_ref().map(|r| r.values.as_slice()));

        debug!(
            record = %record_name,
            transition = %transition,
            current = ?current,
            desired = ?desired,
            "Planning record change"
        );

        let change = match transition {
            LifecycleTransition::Launching => plan_launching(
                dns_config,
                &record_name,
                record.is_some(),
                &current,
                desired,
            )?,
            LifecycleTransition::Draining => {
                let record_ttl = record.as_ref().map(|r| r.ttl);
                plan_draining(dns_config, &record_name, record_ttl, &current, desired)?
            }
            LifecycleTransition::Reconciling => plan_reconciling(
                dns_config,
                &record_name,
                record.is_some(),
                &current,
                desired,
            )?,
            LifecycleTransition::Unrelated => {
                ChangeRequest::ignore(&record_name, &dns_config.record_type)
            }
        };
        Ok(change)
    }
}

/// Values currently on the record, minus the mock value iff the record is
/// managed. An absent record has no values.
fn current_values(config: &DnsRecordConfig, record_values: Option<&[String]>) -> Vec<String> {
    let Some(values) = record_values else {
        return Vec::new();
    };
    if config.managed_dns_record {
        values
            .iter()
            .filter(|v| **v != config.dns_mock_value)
            .cloned()
            .collect()
    } else {
        values.to_vec()
    }
}

fn plan_launching(
    config: &DnsRecordConfig,
    record_name: &str,
    record_exists: bool,
    current: &[String],
    desired: &[String],
) -> Result<ChangeRequest, ConfigError> {
    if desired.is_empty() {
        return Ok(ChangeRequest::ignore(record_name, &config.record_type));
    }
    let current_set: BTreeSet<&String> = current.iter().collect();
    if desired.iter().all(|v| current_set.contains(v)) {
        return Ok(ChangeRequest::ignore(record_name, &config.record_type));
    }

    let values = match config.mode {
        // In SINGLE mode the first desired value wins; mixing current values
        // into the pick would make the survivor order-dependent.
        RecordMode::Single => vec![desired[0].clone()],
        RecordMode::Multivalue => {
            let mut merged = current.to_vec();
            merged.extend_from_slice(desired);
            merged
        }
    };
    let action = if record_exists {
        ChangeAction::Update
    } else {
        ChangeAction::Create
    };
    ChangeRequest::new(
        action,
        record_name,
        &config.record_type,
        config.record_ttl,
        config.record_weight,
        config.record_priority,
        values,
    )
}

fn plan_draining(
    config: &DnsRecordConfig,
    record_name: &str,
    record_ttl: Option<u32>,
    current: &[String],
    desired: &[String],
) -> Result<ChangeRequest, ConfigError> {
    // Record absent, or nothing beyond the managed mock value: nothing to drain
    let Some(ttl) = record_ttl else {
        return Ok(ChangeRequest::ignore(record_name, &config.record_type));
    };
    if current.is_empty() {
        return Ok(ChangeRequest::ignore(record_name, &config.record_type));
    }

    let remaining: Vec<String> = current
        .iter()
        .filter(|v| !desired.contains(v))
        .cloned()
        .collect();

    if remaining.is_empty() {
        if config.managed_dns_record {
            // A managed record may never be deleted; park it on the mock value
            return ChangeRequest::new(
                ChangeAction::Update,
                record_name,
                &config.record_type,
                ttl,
                config.record_weight,
                config.record_priority,
                vec![config.dns_mock_value.clone()],
            );
        }
        // The current values identify the record set the provider removes
        return ChangeRequest::new(
            ChangeAction::Delete,
            record_name,
            &config.record_type,
            ttl,
            config.record_weight,
            config.record_priority,
            current.to_vec(),
        );
    }

    ChangeRequest::new(
        ChangeAction::Update,
        record_name,
        &config.record_type,
        ttl,
        config.record_weight,
        config.record_priority,
        remaining,
    )
}

fn plan_reconciling(
    config: &DnsRecordConfig,
    record_name: &str,
    record_exists: bool,
    current: &[String],
    desired: &[String],
) -> Result<ChangeRequest, ConfigError> {
    let current_set: BTreeSet<&String> = current.iter().collect();
    let desired_set: BTreeSet<&String> = desired.iter().collect();
    if current_set == desired_set {
        return Ok(ChangeRequest::ignore(record_name, &config.record_type));
    }

    if desired.is_empty() {
        // Sets differ and desired is empty, so the record exists with values
        if config.managed_dns_record {
            // Converge an emptied managed record onto the mock value
            return ChangeRequest::new(
                ChangeAction::Update,
                record_name,
                &config.record_type,
                config.record_ttl,
                config.record_weight,
                config.record_priority,
                vec![config.dns_mock_value.clone()],
            );
        }
        return ChangeRequest::new(
            ChangeAction::Delete,
            record_name,
            &config.record_type,
            config.record_ttl,
            config.record_weight,
            config.record_priority,
            current.to_vec(),
        );
    }

    let values = match config.mode {
        RecordMode::Single => vec![desired[0].clone()],
        RecordMode::Multivalue => desired.to_vec(),
    };
    let action = if record_exists {
        ChangeAction::Update
    } else {
        ChangeAction::Create
    };
    ChangeRequest::new(
        action,
        record_name,
        &config.record_type,
        config.record_ttl,
        config.record_weight,
        config.record_priority,
        values,
    )
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod planner_tests;
