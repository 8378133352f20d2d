// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! KV-backed advisory locking.
//!
//! A lock is a row keyed by the resource id; acquisition maps to the
//! repository's conditional `create`, so a collision (row already present)
//! simply means the lock is held elsewhere. Locks are deleted on release;
//! absence means "not held".
//!
//! [`DistributedLock::acquire_with_backoff`] layers bounded-attempt
//! acquisition with linear backoff on top, for callers that would rather
//! wait out a short contention window than fail immediately.

use crate::constants::LOCK_MAX_ATTEMPTS;
use crate::errors::ProviderError;
use crate::repository::Repository;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Advisory per-resource lock backed by the repository.
#[derive(Clone)]
pub struct DistributedLock {
    repository: Arc<dyn Repository>,
}

impl DistributedLock {
    /// Create a lock service over a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Check whether a lock row exists for the resource.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the underlying repository call fails.
    pub async fn check(&self, resource_id: &str) -> Result<bool, ProviderError> {
        debug!(resource = resource_id, "Checking lock");
        Ok(self.repository.get(resource_id).await?.is_some())
    }

    /// Attempt to acquire the lock once.
    ///
    /// Returns `true` when the lock row was created, `false` when the row
    /// already exists (held by another writer).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the underlying repository call fails.
    pub async fn acquire(&self, resource_id: &str) -> Result<bool, ProviderError> {
        debug!(resource = resource_id, "Acquiring lock");
        let row = json!({
            "resource_id": resource_id,
            "timestamp": Utc::now().timestamp(),
        });
        Ok(self.repository.create(resource_id, row).await?.is_some())
    }

    /// Release the lock by deleting its row.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the underlying repository call fails.
    pub async fn release(&self, resource_id: &str) -> Result<(), ProviderError> {
        debug!(resource = resource_id, "Releasing lock");
        self.repository.delete(resource_id).await?;
        Ok(())
    }

    /// Acquire with bounded attempts and linear backoff.
    ///
    /// Makes up to [`LOCK_MAX_ATTEMPTS`] attempts, sleeping `n` seconds after
    /// the n-th failed attempt. Returns `true` on success, `false` when all
    /// attempts were exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when an underlying repository call fails.
    pub async fn acquire_with_backoff(&self, resource_id: &str) -> Result<bool, ProviderError> {
        for attempt in 1..=LOCK_MAX_ATTEMPTS {
            if self.acquire(resource_id).await? {
                return Ok(true);
            }
            debug!(
                resource = resource_id,
                attempt = attempt,
                max_attempts = LOCK_MAX_ATTEMPTS,
                "Waiting for lock to be obtained"
            );
            if attempt < LOCK_MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod lock_tests;
