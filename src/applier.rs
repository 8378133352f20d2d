// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Applies planned changes through the DNS provider.

use crate::change::{ChangeAction, ChangeRequest};
use crate::config::ScalingGroupConfig;
use crate::errors::DiscoveryError;
use crate::metrics;
use crate::providers::DnsProvider;
use crate::retry::retry_provider_call;
use std::sync::Arc;
use tracing::{debug, info};

/// Translates a [`ChangeRequest`] into a provider batch and applies it.
#[derive(Clone)]
pub struct ChangeApplier {
    dns: Arc<dyn DnsProvider>,
}

impl ChangeApplier {
    /// Create an applier over the DNS provider.
    #[must_use]
    pub fn new(dns: Arc<dyn DnsProvider>) -> Self {
        Self { dns }
    }

    /// Apply one change request.
    ///
    /// IGNORE requests are a no-op. Everything else is encoded into the
    /// provider batch shape and sent, with transient provider errors retried
    /// in-process. The provider adapter is responsible for awaiting
    /// propagation where its backend supports it.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when batch encoding or the provider call
    /// fails after retries.
    pub async fn apply(
        &self,
        config: &ScalingGroupConfig,
        change: &ChangeRequest,
    ) -> Result<(), DiscoveryError> {
        if change.action == ChangeAction::Ignore {
            debug!(record = %change.record_name, "Change is IGNORE, nothing to apply");
            return Ok(());
        }

        let zone_id = &config.dns_config.dns_zone_id;
        let Some(batch) = change.to_batch(config.dns_config.provider)? else {
            return Ok(());
        };
        debug!(
            zone = %zone_id,
            change = %change,
            "Applying change batch"
        );
        retry_provider_call(
            || self.dns.apply_batch(zone_id, &batch),
            "apply change batch",
        )
        .await?;
        metrics::record_change_applied(&change.action.to_string());
        info!(zone = %zone_id, change = %change, "Change applied");
        Ok(())
    }
}

#[cfg(test)]
#[path = "applier_tests.rs"]
mod applier_tests;
