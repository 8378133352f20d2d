// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared application context.
//!
//! The component graph is built once at startup and threaded through the
//! handlers as an `Arc<AppContext>`: provider adapters, process settings, and
//! the lazily-loaded configuration document cache. There is no mutable global
//! state; the "scoped" lifetime of the original design is coextensive with
//! one invocation, which simply borrows this context.

use crate::applier::ChangeApplier;
use crate::config::{ReadinessConfig, ScalingGroupConfig, ScalingGroupConfigs};
use crate::errors::{ConfigError, DiscoveryError};
use crate::health::HealthChecker;
use crate::lock::DistributedLock;
use crate::memory::{MemoryCloudProvider, MemoryDnsProvider, MemoryRepository};
use crate::metadata::MetadataResolver;
use crate::planner::RecordPlanner;
use crate::providers::{DnsProvider, InstanceProvider, ScalingGroupProvider};
use crate::readiness::ReadinessProber;
use crate::repository::Repository;
use crate::retry::retry_provider_call;
use crate::settings::Settings;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Shared context passed to all handlers and coordinators.
pub struct AppContext {
    /// Environment-derived process settings
    pub settings: Settings,
    /// KV repository backing locks and configuration
    pub repository: Arc<dyn Repository>,
    /// DNS zone provider
    pub dns: Arc<dyn DnsProvider>,
    /// Compute/instance provider
    pub instances: Arc<dyn InstanceProvider>,
    /// Scaling-group provider
    pub scaling_groups: Arc<dyn ScalingGroupProvider>,
    /// Advisory lock service over the repository
    pub lock: DistributedLock,
    /// Health probe client
    pub health: HealthChecker,
    configs: OnceCell<Arc<ScalingGroupConfigs>>,
}

/// Concrete handles onto the in-memory backends, for seeding state in
/// development setups and tests.
pub struct MockBackends {
    /// The in-memory repository
    pub repository: Arc<MemoryRepository>,
    /// The in-memory DNS provider
    pub dns: Arc<MemoryDnsProvider>,
    /// The in-memory compute and scaling-group provider
    pub cloud: Arc<MemoryCloudProvider>,
}

impl AppContext {
    /// Build a context over explicit provider adapters.
    #[must_use]
    pub fn new(
        settings: Settings,
        repository: Arc<dyn Repository>,
        dns: Arc<dyn DnsProvider>,
        instances: Arc<dyn InstanceProvider>,
        scaling_groups: Arc<dyn ScalingGroupProvider>,
    ) -> Self {
        let lock = DistributedLock::new(repository.clone());
        Self {
            settings,
            repository,
            dns,
            instances,
            scaling_groups,
            lock,
            health: HealthChecker::new(),
            configs: OnceCell::new(),
        }
    }

    /// Build a context wired to the in-memory providers, returning the
    /// concrete backend handles alongside it.
    #[must_use]
    pub fn mock(settings: Settings) -> (Arc<Self>, MockBackends) {
        let repository = Arc::new(MemoryRepository::new());
        let dns = Arc::new(MemoryDnsProvider::new());
        let cloud = Arc::new(MemoryCloudProvider::new());
        let ctx = Arc::new(Self::new(
            settings,
            repository.clone(),
            dns.clone(),
            cloud.clone(),
            cloud.clone(),
        ));
        (
            ctx,
            MockBackends {
                repository,
                dns,
                cloud,
            },
        )
    }

    /// Build a context for the configured cloud provider.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Provider`] when no adapter set is wired for
    /// the configured `cloud_provider`.
    pub fn from_settings(settings: Settings) -> Result<Arc<Self>, DiscoveryError> {
        match settings.cloud_provider.as_str() {
            "mock" => {
                info!("Using in-memory providers (cloud_provider=mock)");
                Ok(Self::mock(settings).0)
            }
            other => Err(crate::errors::ProviderError::UnsupportedProvider {
                provider: other.to_string(),
            }
            .into()),
        }
    }

    /// The decoded scaling group configurations.
    ///
    /// Loaded from the KV store on first access and cached for the process
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Config`] when the document is missing or
    /// fails to decode, and [`DiscoveryError::Provider`] when the KV call
    /// fails after retries.
    pub async fn scaling_group_configs(
        &self,
    ) -> Result<Arc<ScalingGroupConfigs>, DiscoveryError> {
        let configs = self
            .configs
            .get_or_try_init(|| async {
                let key = self.settings.db.config_item_key_id.clone();
                let document = retry_provider_call(
                    || self.repository.get(&key),
                    "load configuration document",
                )
                .await?;
                let document = document.ok_or_else(|| ConfigError::DocumentNotFound {
                    table: self.settings.db.table_name.clone(),
                    key: key.clone(),
                })?;
                let configs = ScalingGroupConfigs::from_document(&key, &document)?;
                info!(
                    items = configs.items.len(),
                    "Scaling group configurations loaded"
                );
                Ok::<_, DiscoveryError>(Arc::new(configs))
            })
            .await?;
        Ok(configs.clone())
    }

    /// Metadata resolver over this context's providers.
    #[must_use]
    pub fn resolver(&self) -> MetadataResolver {
        MetadataResolver::new(self.instances.clone(), self.scaling_groups.clone())
    }

    /// Record planner over this context's providers.
    #[must_use]
    pub fn planner(&self) -> RecordPlanner {
        RecordPlanner::new(self.dns.clone(), self.resolver())
    }

    /// Change applier over this context's DNS provider.
    #[must_use]
    pub fn applier(&self) -> ChangeApplier {
        ChangeApplier::new(self.dns.clone())
    }

    /// Readiness prober over this context's instance provider.
    #[must_use]
    pub fn readiness(&self) -> ReadinessProber {
        ReadinessProber::new(self.instances.clone())
    }

    /// The readiness configuration in effect for a scaling group config:
    /// the config's own block, or the environment defaults.
    #[must_use]
    pub fn effective_readiness(&self, config: &ScalingGroupConfig) -> ReadinessConfig {
        config
            .readiness_config
            .clone()
            .unwrap_or_else(|| self.settings.readiness.clone())
    }
}
