// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bulk and manual reconciliation coordination.
//!
//! Bulk reconciliation groups all configurations by scaling group and fans
//! out one worker per group, bounded by `reconciliation_max_concurrency`.
//! Workers run in chunks of the concurrency bound and each chunk is joined
//! before the next starts, so a slow group delays its chunk; the advisory
//! lock, not the scheduling model, is the correctness boundary. Workers are
//! isolated: a failing group never halts the others, and per-group outcomes
//! are collected over a channel read after the joins.
//!
//! A worker holds the locks of every record it manages for the whole pass,
//! so lifecycle events targeting the same records serialize behind it.

use crate::config::ScalingGroupConfig;
use crate::context::AppContext;
use crate::errors::DiscoveryError;
use crate::event::LifecycleTransition;
use crate::metadata::{value_from_instance, MetadataResolver, ValueSource};
use crate::metrics;
use crate::providers::InstanceDescriptor;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Result of reconciling one scaling group.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    /// The scaling group the worker processed
    pub scaling_group_name: String,
    /// Error message when the worker failed
    pub error: Option<String>,
}

/// Coordinates reconciliation sweeps over scaling groups.
pub struct ReconciliationCoordinator {
    ctx: Arc<AppContext>,
}

impl ReconciliationCoordinator {
    /// Create a coordinator over the shared context.
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile every configured scaling group.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] only when the configuration document cannot
    /// be loaded; individual group failures are reported in the outcomes.
    pub async fn reconcile_all(&self) -> Result<Vec<GroupOutcome>, DiscoveryError> {
        let configs = self.ctx.scaling_group_configs().await?;
        let groups: Vec<(String, Vec<ScalingGroupConfig>)> =
            configs.by_scaling_group().into_iter().collect();
        if groups.is_empty() {
            info!("No scaling groups configured, nothing to reconcile");
            return Ok(Vec::new());
        }

        let concurrency = groups
            .len()
            .min(self.ctx.settings.reconciliation.max_concurrency)
            .max(1);
        info!(
            groups = groups.len(),
            concurrency = concurrency,
            "Starting bulk reconciliation"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<GroupOutcome>();
        for chunk in groups.chunks(concurrency) {
            let mut handles = Vec::with_capacity(chunk.len());
            for (name, group_configs) in chunk {
                let ctx = self.ctx.clone();
                let tx = tx.clone();
                let name = name.clone();
                let group_configs = group_configs.clone();
                handles.push(tokio::spawn(async move {
                    let worker = ReconciliationCoordinator::new(ctx);
                    let error = worker
                        .reconcile_group(&group_configs)
                        .await
                        .err()
                        .map(|e| e.to_string());
                    // The receiver outlives every worker; a send failure
                    // means the coordinator itself is gone
                    let _ = tx.send(GroupOutcome {
                        scaling_group_name: name,
                        error,
                    });
                }));
            }
            join_all(handles).await;
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(groups.len());
        while let Some(outcome) = rx.recv().await {
            match &outcome.error {
                Some(message) => error!(
                    group = %outcome.scaling_group_name,
                    error = %message,
                    "Error processing configuration"
                ),
                None => info!(
                    group = %outcome.scaling_group_name,
                    "Finished processing configuration"
                ),
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Reconcile one scaling group's record set.
    ///
    /// All config items must belong to the same scaling group. Every record
    /// lock is taken up front and held for the whole pass; failing to take
    /// any of them fails the worker.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Business`] on mixed scaling group names,
    /// [`DiscoveryError::LockContention`] when a record lock is held
    /// elsewhere, and [`DiscoveryError::Provider`] on backend failures.
    pub async fn reconcile_group(
        &self,
        configs: &[ScalingGroupConfig],
    ) -> Result<(), DiscoveryError> {
        let Some(first) = configs.first() else {
            return Err(DiscoveryError::Business(
                "reconciliation worker received no configurations".to_string(),
            ));
        };
        let group = first.scaling_group_name.clone();
        if configs.iter().any(|c| c.scaling_group_name != group) {
            return Err(DiscoveryError::Business(
                "scaling group names do not match across worker configurations".to_string(),
            ));
        }

        let started = Instant::now();
        info!(group = %group, items = configs.len(), "Starting reconciliation");

        // Take every record lock before looking at live state
        let mut acquired: Vec<String> = Vec::with_capacity(configs.len());
        let mut lock_failure: Option<DiscoveryError> = None;
        for config in configs {
            let lock_key = config.lock_key();
            match self.ctx.lock.acquire(&lock_key).await {
                Ok(true) => acquired.push(lock_key),
                Ok(false) => {
                    metrics::record_lock_contention(&lock_key);
                    lock_failure = Some(DiscoveryError::LockContention {
                        resource_id: lock_key,
                        attempts: 1,
                    });
                    break;
                }
                Err(e) => {
                    lock_failure = Some(e.into());
                    break;
                }
            }
        }

        let result = match lock_failure {
            Some(e) => Err(e),
            None => self.reconcile_group_locked(&group, first, configs).await,
        };

        // Locks are released on success and on every failure path
        for lock_key in &acquired {
            if let Err(e) = self.ctx.lock.release(lock_key).await {
                warn!(resource = %lock_key, error = %e, "Failed to release record lock");
            }
        }

        metrics::record_reconciliation_run(&group, result.is_ok(), started.elapsed());
        result
    }

    async fn reconcile_group_locked(
        &self,
        group: &str,
        first: &ScalingGroupConfig,
        configs: &[ScalingGroupConfig],
    ) -> Result<(), DiscoveryError> {
        let instances = self
            .ctx
            .scaling_groups
            .list_instances(group, &first.scaling_group_valid_states)
            .await?;
        info!(group = %group, instances = instances.len(), "Instances discovered");

        let what_if = self.ctx.settings.reconciliation.what_if;
        let planner = self.ctx.planner();
        let applier = self.ctx.applier();

        for config in configs {
            let mut contributing = instances.clone();

            let readiness = self.ctx.effective_readiness(config);
            if readiness.enabled {
                contributing
                    .retain(|instance| instance.has_tag(&readiness.tag_key, &readiness.tag_value));
                info!(
                    group = %group,
                    config = %config,
                    instances = contributing.len(),
                    "Instances passed readiness check"
                );
            }

            if let Some(health) = &config.health_check_config {
                if health.enabled {
                    contributing = self.filter_healthy(config, contributing).await;
                    info!(
                        group = %group,
                        config = %config,
                        instances = contributing.len(),
                        "Instances passed health check"
                    );
                }
            }

            let resolved = MetadataResolver::resolve_from_instances(config, &contributing);
            let values: Vec<String> = resolved.into_iter().map(|m| m.value).collect();
            let change = planner
                .plan_with_values(config, LifecycleTransition::Reconciling, &values)
                .await?;

            if what_if {
                info!(
                    config = %config,
                    change = %change,
                    "what-if mode, skipping apply"
                );
                continue;
            }
            applier.apply(config, &change).await?;
        }
        Ok(())
    }

    /// Retain the instances whose health endpoint answers healthy.
    async fn filter_healthy(
        &self,
        config: &ScalingGroupConfig,
        instances: Vec<InstanceDescriptor>,
    ) -> Vec<InstanceDescriptor> {
        let Some(health) = &config.health_check_config else {
            return instances;
        };
        let endpoint_source = ValueSource::parse(&health.endpoint_source);
        let record_source = ValueSource::parse(&config.dns_config.value_source);

        let mut healthy = Vec::with_capacity(instances.len());
        for instance in instances {
            let destination = value_from_instance(&instance, &endpoint_source)
                .or_else(|| value_from_instance(&instance, &record_source));
            let Some(destination) = destination else {
                debug!(
                    instance = %instance.instance_id,
                    "No health endpoint resolvable, excluding instance"
                );
                metrics::record_health_check(false);
                continue;
            };
            let result = self.ctx.health.check(&destination, health).await;
            metrics::record_health_check(result.healthy());
            if result.healthy() {
                healthy.push(instance);
            } else {
                debug!(
                    instance = %instance.instance_id,
                    endpoint = %destination,
                    "Instance failed health check, excluding"
                );
            }
        }
        healthy
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
