// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Uniform KV repository abstraction.
//!
//! The repository backs the distributed lock rows and the configuration
//! document. `create` is conditional on key absence, which is the primitive
//! the advisory lock is built on.

use crate::errors::ProviderError;
use async_trait::async_trait;

/// A minimal KV store.
///
/// All IO errors other than a conditional-create collision surface as
/// [`ProviderError::Repository`] with enough context to identify the backend
/// call.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fetch an item by key; `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, ProviderError>;

    /// Create an item iff the key is absent.
    ///
    /// Returns the stored item, or `None` when the key already exists
    /// (a collision is not an error).
    async fn create(
        &self,
        key: &str,
        item: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, ProviderError>;

    /// Unconditionally store an item under a key.
    async fn put(&self, key: &str, item: serde_json::Value) -> Result<(), ProviderError>;

    /// Delete an item; returns whether a row was removed.
    async fn delete(&self, key: &str) -> Result<bool, ProviderError>;
}
