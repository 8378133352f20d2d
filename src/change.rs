// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS change request model and provider batch encoding.
//!
//! The planner emits an abstract [`ChangeRequest`]; the applier encodes it
//! into a provider-shaped [`ChangeBatch`] (one UPSERT for CREATE/UPDATE, one
//! DELETE for DELETE) and hands it to the DNS provider adapter. Provider
//! details never leak into the request type itself.

use crate::config::RecordProvider;
use crate::errors::{ConfigError, ProviderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Action a change request asks the provider to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    /// Create a new record
    Create,
    /// Update an existing record
    Update,
    /// Delete an existing record
    Delete,
    /// Do nothing; the record already matches the desired state
    Ignore,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Ignore => "IGNORE",
        };
        write!(f, "{name}")
    }
}

/// An abstract DNS change computed by the planner.
///
/// Values are deduplicated and sorted on construction, so two planner runs
/// over the same inputs emit byte-identical requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// The action to perform
    pub action: ChangeAction,
    /// Fully qualified record name
    pub record_name: String,
    /// Record type, upper case
    pub record_type: String,
    /// Record TTL in seconds
    pub record_ttl: u32,
    /// Weight for weighted record types
    pub record_weight: u16,
    /// Priority for prioritized record types
    pub record_priority: u16,
    /// Deduplicated, lexicographically sorted record values. For DELETE this
    /// is the current value set, used by the provider to identify what to
    /// remove.
    pub record_values: Vec<String>,
}

impl ChangeRequest {
    /// Build a change request, normalizing the record type and value set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyField`] when a non-IGNORE action is
    /// missing the record name or type.
    pub fn new(
        action: ChangeAction,
        record_name: &str,
        record_type: &str,
        record_ttl: u32,
        record_weight: u16,
        record_priority: u16,
        values: Vec<String>,
    ) -> Result<Self, ConfigError> {
        if action != ChangeAction::Ignore {
            if record_name.is_empty() {
                return Err(ConfigError::EmptyField {
                    field: "record_name",
                    context: format!("DNS change request action '{action}'"),
                });
            }
            if record_type.is_empty() {
                return Err(ConfigError::EmptyField {
                    field: "record_type",
                    context: format!("DNS change request action '{action}'"),
                });
            }
        }
        Ok(Self {
            action,
            record_name: record_name.to_string(),
            record_type: record_type.to_uppercase(),
            record_ttl,
            record_weight,
            record_priority,
            record_values: dedupe_sorted(values),
        })
    }

    /// Build an IGNORE request carrying only the record identity.
    #[must_use]
    pub fn ignore(record_name: &str, record_type: &str) -> Self {
        Self {
            action: ChangeAction::Ignore,
            record_name: record_name.to_string(),
            record_type: record_type.to_uppercase(),
            record_ttl: 0,
            record_weight: 0,
            record_priority: 0,
            record_values: Vec::new(),
        }
    }

    /// Encode this request into a provider change batch.
    ///
    /// Returns `None` for IGNORE. Route53 and the mock provider share the
    /// UPSERT/DELETE batch shape; Cloudflare has no encoder wired.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedProvider`] for providers without
    /// a batch encoder.
    pub fn to_batch(
        &self,
        provider: RecordProvider,
    ) -> Result<Option<ChangeBatch>, ProviderError> {
        if self.action == ChangeAction::Ignore {
            return Ok(None);
        }
        match provider {
            RecordProvider::Route53 | RecordProvider::Mock => Ok(Some(self.upsert_batch())),
            RecordProvider::Cloudflare => Err(ProviderError::UnsupportedProvider {
                provider: provider.as_str().to_string(),
            }),
        }
    }

    fn upsert_batch(&self) -> ChangeBatch {
        let action = match self.action {
            ChangeAction::Create | ChangeAction::Update => BatchAction::Upsert,
            ChangeAction::Delete => BatchAction::Delete,
            ChangeAction::Ignore => unreachable!("IGNORE never reaches batch encoding"),
        };
        ChangeBatch {
            changes: vec![BatchChange {
                action,
                record: RecordSet {
                    name: self.record_name.clone(),
                    record_type: self.record_type.clone(),
                    ttl: self.record_ttl,
                    weight: self.record_weight,
                    priority: self.record_priority,
                    values: self.record_values.clone(),
                },
            }],
        }
    }
}

impl fmt::Display for ChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.record_name,
            self.record_type,
            self.action,
            self.record_values.join(", ")
        )
    }
}

/// Action inside a provider change batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchAction {
    /// Create-or-replace the record set
    Upsert,
    /// Delete the record set
    Delete,
}

/// A record set as known to the DNS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Fully qualified record name
    pub name: String,
    /// Record type, upper case
    pub record_type: String,
    /// TTL in seconds
    pub ttl: u32,
    /// Weight for weighted record types
    pub weight: u16,
    /// Priority for prioritized record types
    pub priority: u16,
    /// Record values in provider order
    pub values: Vec<String>,
}

/// One change inside a provider batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchChange {
    /// The provider-level action
    pub action: BatchAction,
    /// The record set the action applies to
    pub record: RecordSet,
}

/// A provider-shaped batch of record changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Changes applied as one unit
    pub changes: Vec<BatchChange>,
}

/// Deduplicate and sort values lexicographically.
fn dedupe_sorted(values: Vec<String>) -> Vec<String> {
    values.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod change_tests;
