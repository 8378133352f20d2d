// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle event coordination.
//!
//! Orchestrates one lifecycle event end to end: readiness gating, health
//! gating, per-record locking, planning, applying, and finally acknowledging
//! the lifecycle hook with CONTINUE or ABANDON.
//!
//! State machine per event:
//!
//! ```text
//! START → VALIDATED → (READY | ABANDONED)
//! READY → (HEALTHY | ABANDONED)
//! HEALTHY → LOCK_HELD → APPLIED → ACK_CONTINUE → END
//! any ABANDONED → ACK_ABANDON → END
//! ```
//!
//! The handler result is `true` iff every matching config's sub-state-machine
//! completed with apply-or-ignore.

use crate::config::{ProceedMode, ScalingGroupConfig};
use crate::context::AppContext;
use crate::errors::DiscoveryError;
use crate::event::{LifecycleAction, LifecycleEvent, LifecycleTransition};
use crate::metadata::{value_from_instance, ValueSource};
use crate::metrics;
use crate::providers::InstanceDescriptor;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Coordinates the handling of one lifecycle event.
pub struct LifecycleCoordinator {
    ctx: Arc<AppContext>,
}

impl LifecycleCoordinator {
    /// Create a coordinator over the shared context.
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Handle one lifecycle event.
    ///
    /// Returns `true` when every matching configuration completed with
    /// apply-or-ignore and the hook was acknowledged with CONTINUE.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] only for configuration-load failures, which
    /// are fatal to the invocation. Provider failures during gating,
    /// planning, or applying are translated into an ABANDON acknowledgement
    /// and a `false` result.
    pub async fn handle(&self, event: &LifecycleEvent) -> Result<bool, DiscoveryError> {
        let started = Instant::now();
        let handled = self.handle_inner(event).await?;
        metrics::record_lifecycle_event(
            &event.transition.to_string(),
            if handled { "continue" } else { "abandon" },
            started.elapsed(),
        );
        Ok(handled)
    }

    async fn handle_inner(&self, event: &LifecycleEvent) -> Result<bool, DiscoveryError> {
        let configs = self.ctx.scaling_group_configs().await?;
        let matching = configs.for_scaling_group(&event.scaling_group_name);
        if matching.is_empty() {
            // Never block scaling over a group this controller does not manage
            warn!(
                group = %event.scaling_group_name,
                "No DNS configurations found for scaling group"
            );
            self.acknowledge(event, LifecycleAction::Continue).await;
            return Ok(false);
        }

        if event.transition == LifecycleTransition::Unrelated {
            info!(
                group = %event.scaling_group_name,
                origin = %event.origin,
                destination = %event.destination,
                "Event does not map to a known transition, ignoring"
            );
            self.acknowledge(event, LifecycleAction::Continue).await;
            return Ok(false);
        }

        // Gate every config first; the proceed mode decides what gets applied
        let mut readiness_passed: HashSet<String> = HashSet::new();
        let mut gated: Vec<(ScalingGroupConfig, bool)> = Vec::with_capacity(matching.len());
        for config in matching {
            let passed = self.gate(event, &config, &mut readiness_passed).await;
            gated.push((config, passed));
        }

        let proceed_mode = gated[0].0.multiple_config_proceed_mode;
        let total = gated.len();
        let passed_count = gated.iter().filter(|(_, passed)| *passed).count();
        let apply_set: Vec<ScalingGroupConfig> = match proceed_mode {
            ProceedMode::AllOperational => {
                if passed_count < total {
                    warn!(
                        group = %event.scaling_group_name,
                        passed = passed_count,
                        total = total,
                        "Not all configurations operational, abandoning"
                    );
                    self.acknowledge(event, LifecycleAction::Abandon).await;
                    return Ok(false);
                }
                gated.into_iter().map(|(config, _)| config).collect()
            }
            ProceedMode::SelfOperational | ProceedMode::MajorityOperational => {
                if passed_count == 0
                    || (proceed_mode == ProceedMode::MajorityOperational
                        && passed_count * 2 <= total)
                {
                    warn!(
                        group = %event.scaling_group_name,
                        passed = passed_count,
                        total = total,
                        mode = ?proceed_mode,
                        "Too few operational configurations, abandoning"
                    );
                    self.acknowledge(event, LifecycleAction::Abandon).await;
                    return Ok(false);
                }
                gated
                    .into_iter()
                    .filter_map(|(config, passed)| passed.then_some(config))
                    .collect()
            }
        };

        for config in &apply_set {
            if !self.converge_record(event, config).await {
                self.acknowledge(event, LifecycleAction::Abandon).await;
                return Ok(false);
            }
        }

        self.acknowledge(event, LifecycleAction::Continue).await;
        Ok(true)
    }

    /// Run readiness and health gating for one config.
    ///
    /// Readiness checks are memoized per event by configuration identity, so
    /// sibling configs sharing a gate are only probed once. Provider failures
    /// count as a failed gate.
    async fn gate(
        &self,
        event: &LifecycleEvent,
        config: &ScalingGroupConfig,
        readiness_passed: &mut HashSet<String>,
    ) -> bool {
        let readiness = self.ctx.effective_readiness(config);
        if readiness.enabled {
            let identity = readiness.identity();
            if readiness_passed.contains(&identity) {
                debug!(
                    group = %event.scaling_group_name,
                    "Readiness check previously passed for this event"
                );
            } else {
                let ready = match self
                    .ctx
                    .readiness()
                    .is_ready(&event.instance_id, &readiness, true)
                    .await
                {
                    Ok(ready) => ready,
                    Err(e) => {
                        error!(
                            instance = %event.instance_id,
                            error = %e,
                            "Readiness check failed with provider error"
                        );
                        false
                    }
                };
                metrics::record_readiness_check(ready);
                if !ready {
                    warn!(
                        instance = %event.instance_id,
                        config = %config,
                        "Instance readiness check failed"
                    );
                    return false;
                }
                readiness_passed.insert(identity);
            }
        } else {
            debug!(group = %event.scaling_group_name, "Readiness check disabled");
        }

        let Some(health) = &config.health_check_config else {
            return true;
        };
        if !health.enabled {
            return true;
        }

        let Some(destination) = self.resolve_health_endpoint(event, config).await else {
            warn!(
                instance = %event.instance_id,
                config = %config,
                "No health check endpoint could be resolved"
            );
            metrics::record_health_check(false);
            return false;
        };
        let result = self.ctx.health.check(&destination, health).await;
        metrics::record_health_check(result.healthy());
        if !result.healthy() {
            warn!(
                instance = %event.instance_id,
                endpoint = %destination,
                config = %config,
                "Instance health check failed"
            );
            return false;
        }
        true
    }

    /// Resolve the health probe destination for the event's instance.
    ///
    /// The health config's `endpoint_source` wins; when it resolves to
    /// nothing, the record's contributing value is used instead.
    async fn resolve_health_endpoint(
        &self,
        event: &LifecycleEvent,
        config: &ScalingGroupConfig,
    ) -> Option<String> {
        let instance: InstanceDescriptor = self
            .ctx
            .instances
            .describe_instance(&event.instance_id)
            .await
            .ok()
            .flatten()?;
        let endpoint_source = config
            .health_check_config
            .as_ref()
            .map(|h| ValueSource::parse(&h.endpoint_source))
            .unwrap_or(ValueSource::Unknown);
        value_from_instance(&instance, &endpoint_source).or_else(|| {
            let record_source = ValueSource::parse(&config.dns_config.value_source);
            value_from_instance(&instance, &record_source)
        })
    }

    /// Lock, plan, and apply one record. Returns whether the record
    /// completed with apply-or-ignore.
    async fn converge_record(&self, event: &LifecycleEvent, config: &ScalingGroupConfig) -> bool {
        let lock_key = config.lock_key();
        match self.ctx.lock.acquire_with_backoff(&lock_key).await {
            Ok(true) => {}
            Ok(false) => {
                metrics::record_lock_contention(&lock_key);
                error!(resource = %lock_key, "Failed to acquire record lock");
                return false;
            }
            Err(e) => {
                error!(resource = %lock_key, error = %e, "Lock acquisition failed");
                return false;
            }
        }

        let result = async {
            let change = self.ctx.planner().plan(config, event).await?;
            info!(config = %config, change = %change, "Planned record change");
            self.ctx.applier().apply(config, &change).await
        }
        .await;

        // The lock is released on success and on error alike
        if let Err(e) = self.ctx.lock.release(&lock_key).await {
            warn!(resource = %lock_key, error = %e, "Failed to release record lock");
        }

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(config = %config, error = %e, "Record convergence failed");
                false
            }
        }
    }

    /// Acknowledge the event's lifecycle hook.
    ///
    /// Events without a hook (reconciling, unrelated notifications) are not
    /// acknowledged. Acknowledgement failures are logged and swallowed; the
    /// hook will time out on the provider side.
    async fn acknowledge(&self, event: &LifecycleEvent, action: LifecycleAction) {
        if event.lifecycle_hook_name.is_empty() {
            return;
        }
        match self
            .ctx
            .scaling_groups
            .complete_lifecycle_action(event, action)
            .await
        {
            Ok(()) => {
                info!(
                    instance = %event.instance_id,
                    action = action.as_str(),
                    "Lifecycle action completed"
                );
            }
            Err(e) => {
                error!(
                    instance = %event.instance_id,
                    action = action.as_str(),
                    error = %e,
                    "Failed to complete lifecycle action"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;
