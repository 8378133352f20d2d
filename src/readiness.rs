// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Instance readiness probing.
//!
//! Readiness is a tag-based predicate over an instance, independent of the
//! scaling lifecycle: deployment tooling marks an instance ready by writing a
//! configured tag pair. The prober polls the instance's tag set until the
//! pair appears or the configured time budget is spent.

use crate::config::ReadinessConfig;
use crate::errors::ProviderError;
use crate::providers::InstanceProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polls an instance's tags for a readiness marker.
#[derive(Clone)]
pub struct ReadinessProber {
    instances: Arc<dyn InstanceProvider>,
}

impl ReadinessProber {
    /// Create a prober over the instance provider.
    #[must_use]
    pub fn new(instances: Arc<dyn InstanceProvider>) -> Self {
        Self { instances }
    }

    /// Check whether an instance is ready.
    ///
    /// Disabled configs are trivially ready. A missing instance is never
    /// ready. With `wait` set, the tag set is reloaded every
    /// `interval_seconds` until the pair appears or `timeout_seconds` have
    /// been slept in total.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when an instance describe call fails.
    pub async fn is_ready(
        &self,
        instance_id: &str,
        config: &ReadinessConfig,
        wait: bool,
    ) -> Result<bool, ProviderError> {
        if !config.enabled {
            return Ok(true);
        }

        let Some(instance) = self.instances.describe_instance(instance_id).await? else {
            warn!(instance = instance_id, "Instance not found for readiness check");
            return Ok(false);
        };

        if instance.has_tag(&config.tag_key, &config.tag_value) {
            debug!(instance = instance_id, "Readiness tag present");
            return Ok(true);
        }
        if !wait {
            return Ok(false);
        }

        // A zero interval would never advance the time accounting
        let interval = config.interval_seconds.max(1);
        let mut slept = 0u64;
        while slept <= config.timeout_seconds {
            info!(
                instance = instance_id,
                tag_key = %config.tag_key,
                tag_value = %config.tag_value,
                elapsed = slept,
                timeout = config.timeout_seconds,
                "Waiting for readiness tag"
            );
            tokio::time::sleep(Duration::from_secs(interval)).await;
            slept += interval;

            // Reload the tag set each iteration
            let Some(instance) = self.instances.describe_instance(instance_id).await? else {
                warn!(instance = instance_id, "Instance disappeared during readiness wait");
                return Ok(false);
            };
            if instance.has_tag(&config.tag_key, &config.tag_value) {
                info!(instance = instance_id, "Instance readiness check passed");
                return Ok(true);
            }
        }

        warn!(
            instance = instance_id,
            tag_key = %config.tag_key,
            tag_value = %config.tag_value,
            timeout = config.timeout_seconds,
            "Instance readiness check timed out"
        );
        Ok(false)
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod readiness_tests;
