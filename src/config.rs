// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scaling group DNS configuration model.
//!
//! The controller's desired state is described by an array of
//! [`ScalingGroupConfig`] items stored in the KV store as a base64-encoded
//! JSON blob (see [`ScalingGroupConfigs::from_document`]). Each item binds one
//! scaling group to one DNS record and carries optional readiness and health
//! gating configuration.
//!
//! All types deserialize leniently (booleans may arrive as `"true"` strings,
//! the way infrastructure tooling tends to write them) and are validated
//! explicitly via their `validate` methods after decoding.

use crate::constants::{
    CONFIG_DOCUMENT_FIELD, DEFAULT_HEALTH_ENDPOINT_SOURCE, DEFAULT_HEALTH_TIMEOUT_SECS,
    DEFAULT_MOCK_VALUE, DEFAULT_READINESS_INTERVAL_SECS, DEFAULT_READINESS_TAG_KEY,
    DEFAULT_READINESS_TAG_VALUE, DEFAULT_READINESS_TIMEOUT_SECS, DEFAULT_RECORD_TTL_SECS,
    DEFAULT_RECORD_TYPE, DEFAULT_VALID_STATE, DEFAULT_VALUE_SOURCE, MULTIVALUE_RECORD_TYPES,
    RECORD_TTL_MAX_SECS, RECORD_TTL_MIN_SECS,
};
use crate::errors::ConfigError;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// DNS backend a record is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordProvider {
    /// AWS Route53
    #[default]
    Route53,
    /// Cloudflare zones
    Cloudflare,
    /// In-memory provider for local development and tests
    Mock,
}

impl RecordProvider {
    /// Provider name as stored in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Route53 => "route53",
            Self::Cloudflare => "cloudflare",
            Self::Mock => "mock",
        }
    }
}

/// How resolved values map onto the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordMode {
    /// The record carries exactly one value
    Single,
    /// The record carries the full deduplicated, sorted value set
    #[default]
    Multivalue,
}

/// How to proceed when a scaling group has multiple DNS configurations and
/// only some of them pass readiness and health gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProceedMode {
    /// Apply changes only if every configuration passed gating
    #[default]
    AllOperational,
    /// Apply changes for each configuration that passed its own gating
    SelfOperational,
    /// Apply the passing configurations only when more than half passed
    MajorityOperational,
}

/// Protocol used for instance health probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthProtocol {
    /// Plain TCP connect
    Tcp,
    /// HTTP GET, healthy iff status 200
    Http,
    /// HTTPS GET, healthy iff status 200
    Https,
}

impl HealthProtocol {
    /// URL scheme for HTTP-shaped probes; `None` for TCP.
    #[must_use]
    pub fn scheme(&self) -> Option<&'static str> {
        match self {
            Self::Tcp => None,
            Self::Http => Some("http"),
            Self::Https => Some("https"),
        }
    }
}

impl fmt::Display for HealthProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Http => write!(f, "HTTP"),
            Self::Https => write!(f, "HTTPS"),
        }
    }
}

/// DNS record configuration for one scaling group binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecordConfig {
    /// DNS backend hosting the record
    #[serde(default)]
    pub provider: RecordProvider,
    /// Zone the record lives in
    pub dns_zone_id: String,
    /// Record name, relative or fully qualified
    pub record_name: String,
    /// Record TTL in seconds
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,
    /// Record type (A, AAAA, CNAME, ...), normalized to upper case
    #[serde(default = "default_record_type")]
    pub record_type: String,
    /// Priority for records that carry one (SRV, MX)
    #[serde(default)]
    pub record_priority: u16,
    /// Weight for records that carry one (SRV)
    #[serde(default)]
    pub record_weight: u16,
    /// Single-value or multivalue mapping
    #[serde(default)]
    pub mode: RecordMode,
    /// Where record values are resolved from: `ip:public`, `ip:private`
    /// or `tag:<key>`
    #[serde(default = "default_value_source")]
    pub value_source: String,
    /// Whether the record's existence is owned by an external declarative
    /// system. Managed records are never deleted, only emptied down to the
    /// mock value.
    #[serde(default, deserialize_with = "de_boolish")]
    pub managed_dns_record: bool,
    /// Placeholder value written to a managed record whose value set
    /// would otherwise become empty
    #[serde(default = "default_mock_value")]
    pub dns_mock_value: String,
}

impl DnsRecordConfig {
    /// Validate field ranges and normalize the record type to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the zone id or record name is empty, the
    /// TTL is out of range, or the record type does not support MULTIVALUE
    /// mode.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.record_type = self.record_type.to_uppercase();

        if self.dns_zone_id.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "dns_zone_id",
                context: format!("record '{}'", self.record_name),
            });
        }
        if self.record_name.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "record_name",
                context: format!("zone '{}'", self.dns_zone_id),
            });
        }
        if !(RECORD_TTL_MIN_SECS..=RECORD_TTL_MAX_SECS).contains(&self.record_ttl) {
            return Err(ConfigError::InvalidTtl {
                ttl: self.record_ttl,
            });
        }
        if self.mode == RecordMode::Multivalue
            && !MULTIVALUE_RECORD_TYPES.contains(&self.record_type.as_str())
        {
            return Err(ConfigError::UnsupportedMultivalueType {
                record_type: self.record_type.clone(),
            });
        }
        Ok(())
    }
}

/// Health check configuration for instances contributing to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Whether health gating is enabled
    #[serde(default, deserialize_with = "de_boolish")]
    pub enabled: bool,
    /// Where the probe destination is resolved from
    /// (`ip:private`, `ip:public`, `tag:<key>`)
    #[serde(default = "default_endpoint_source")]
    pub endpoint_source: String,
    /// Request path for HTTP(S) probes
    #[serde(default)]
    pub path: String,
    /// Port to probe
    #[serde(default = "default_health_port")]
    pub port: u16,
    /// Probe protocol
    pub protocol: HealthProtocol,
    /// Per-probe timeout in seconds
    #[serde(default = "default_health_timeout")]
    pub timeout_seconds: u64,
}

impl HealthCheckConfig {
    /// Validate port, timeout, and path requirements.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on an invalid port or timeout, or when an
    /// HTTP(S) probe is enabled without a path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort {
                port: u32::from(self.port),
            });
        }
        if !(1..=60).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout {
                seconds: self.timeout_seconds,
            });
        }
        if self.enabled && self.protocol != HealthProtocol::Tcp && self.path.is_empty() {
            return Err(ConfigError::MissingHealthCheckPath);
        }
        Ok(())
    }
}

/// Readiness gate: a tag pair an instance must carry before it is allowed
/// to contribute to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Whether readiness gating is enabled
    #[serde(default, deserialize_with = "de_boolish")]
    pub enabled: bool,
    /// Interval between tag polls when waiting
    #[serde(default = "default_readiness_interval")]
    pub interval_seconds: u64,
    /// Total time budget for a readiness wait
    #[serde(default = "default_readiness_timeout")]
    pub timeout_seconds: u64,
    /// Tag key checked for readiness
    #[serde(default = "default_readiness_tag_key")]
    pub tag_key: String,
    /// Tag value checked for readiness
    #[serde(default = "default_readiness_tag_value")]
    pub tag_value: String,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: DEFAULT_READINESS_INTERVAL_SECS,
            timeout_seconds: DEFAULT_READINESS_TIMEOUT_SECS,
            tag_key: DEFAULT_READINESS_TAG_KEY.to_string(),
            tag_value: DEFAULT_READINESS_TAG_VALUE.to_string(),
        }
    }
}

impl ReadinessConfig {
    /// Stable identity of this readiness configuration.
    ///
    /// Two configurations with identical parameters share an identity, so a
    /// readiness check passed once per event is not repeated for sibling
    /// configs with the same gate.
    #[must_use]
    pub fn identity(&self) -> String {
        config_hash(self)
    }
}

/// One scaling group → DNS record binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingGroupConfig {
    /// Name of the scaling group
    pub scaling_group_name: String,
    /// Lifecycle states an instance must be in to contribute
    #[serde(default = "default_valid_states")]
    pub scaling_group_valid_states: Vec<String>,
    /// How to proceed when several configs exist for the same group
    #[serde(default)]
    pub multiple_config_proceed_mode: ProceedMode,
    /// The DNS record this group feeds
    pub dns_config: DnsRecordConfig,
    /// Optional health gating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_config: Option<HealthCheckConfig>,
    /// Optional readiness gating; environment defaults apply when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_config: Option<ReadinessConfig>,
}

impl ScalingGroupConfig {
    /// Validate this config item and normalize nested fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the scaling group name is empty or any
    /// nested configuration fails validation.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.scaling_group_name.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "scaling_group_name",
                context: "scaling group configuration".to_string(),
            });
        }
        if self.scaling_group_valid_states.is_empty() {
            self.scaling_group_valid_states = default_valid_states();
        }
        self.dns_config.validate()?;
        if let Some(health) = &self.health_check_config {
            health.validate()?;
        }
        Ok(())
    }

    /// Canonical serialization domain for this record.
    ///
    /// At most one change may be in flight per lock key; the distributed
    /// lock rows are keyed by this value.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.scaling_group_name,
            self.dns_config.dns_zone_id,
            self.dns_config.record_name,
            self.dns_config.record_type
        )
    }
}

impl fmt::Display for ScalingGroupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.scaling_group_name,
            self.dns_config.dns_zone_id,
            self.dns_config.record_name,
            self.dns_config.record_type
        )
    }
}

/// The full set of scaling group configurations managed by this process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalingGroupConfigs {
    /// All configuration items, in document order
    pub items: Vec<ScalingGroupConfig>,
}

impl ScalingGroupConfigs {
    /// Decode the stored configuration document.
    ///
    /// The document is `{"config": "<base64(json array)>"}`; the array items
    /// are validated and normalized before being returned.
    ///
    /// # Arguments
    ///
    /// * `key` - KV key the document was loaded from, for error context
    /// * `document` - The raw document value
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the `config` field is absent, the blob
    /// fails to decode, or any item fails validation.
    pub fn from_document(
        key: &str,
        document: &serde_json::Value,
    ) -> Result<Self, ConfigError> {
        let blob = document
            .get(CONFIG_DOCUMENT_FIELD)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ConfigError::MissingField {
                key: key.to_string(),
                field: CONFIG_DOCUMENT_FIELD.to_string(),
            })?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(blob)
            .map_err(|e| ConfigError::Decode {
                reason: format!("invalid base64: {e}"),
            })?;

        let mut items: Vec<ScalingGroupConfig> =
            serde_json::from_slice(&decoded).map_err(|e| ConfigError::Decode {
                reason: format!("invalid configuration JSON: {e}"),
            })?;

        if items.is_empty() {
            return Err(ConfigError::Decode {
                reason: "configuration array is empty".to_string(),
            });
        }

        for item in &mut items {
            item.validate()?;
        }

        Ok(Self { items })
    }

    /// Configuration items bound to one scaling group, in document order.
    #[must_use]
    pub fn for_scaling_group(&self, name: &str) -> Vec<ScalingGroupConfig> {
        self.items
            .iter()
            .filter(|item| item.scaling_group_name == name)
            .cloned()
            .collect()
    }

    /// All items grouped by scaling group name, groups ordered by name.
    #[must_use]
    pub fn by_scaling_group(&self) -> BTreeMap<String, Vec<ScalingGroupConfig>> {
        let mut groups: BTreeMap<String, Vec<ScalingGroupConfig>> = BTreeMap::new();
        for item in &self.items {
            groups
                .entry(item.scaling_group_name.clone())
                .or_default()
                .push(item.clone());
        }
        groups
    }

    /// Find the single item matching a manual reconciliation request.
    #[must_use]
    pub fn find_record(
        &self,
        scaling_group_name: &str,
        zone_id: &str,
        record_name: &str,
        record_type: &str,
    ) -> Option<&ScalingGroupConfig> {
        self.items.iter().find(|item| {
            item.scaling_group_name == scaling_group_name
                && item.dns_config.dns_zone_id == zone_id
                && item.dns_config.record_name == record_name
                && item.dns_config.record_type.eq_ignore_ascii_case(record_type)
        })
    }
}

/// Calculate a SHA-256 hash of a serializable configuration value.
///
/// Used for stable configuration identities, e.g. the per-event readiness
/// memoization key.
#[must_use]
pub fn config_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deserialize a boolean that may arrive as a bool or as a string such as
/// `"true"` / `"False"`. Unknown strings deserialize to `false`.
fn de_boolish<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Boolish {
        Bool(bool),
        Str(String),
    }

    Ok(match Boolish::deserialize(deserializer)? {
        Boolish::Bool(b) => b,
        Boolish::Str(s) => s.eq_ignore_ascii_case("true"),
    })
}

fn default_record_ttl() -> u32 {
    DEFAULT_RECORD_TTL_SECS
}

fn default_record_type() -> String {
    DEFAULT_RECORD_TYPE.to_string()
}

fn default_mock_value() -> String {
    DEFAULT_MOCK_VALUE.to_string()
}

fn default_value_source() -> String {
    DEFAULT_VALUE_SOURCE.to_string()
}

fn default_valid_states() -> Vec<String> {
    vec![DEFAULT_VALID_STATE.to_string()]
}

fn default_endpoint_source() -> String {
    DEFAULT_HEALTH_ENDPOINT_SOURCE.to_string()
}

fn default_health_port() -> u16 {
    80
}

fn default_health_timeout() -> u64 {
    DEFAULT_HEALTH_TIMEOUT_SECS
}

fn default_readiness_interval() -> u64 {
    DEFAULT_READINESS_INTERVAL_SECS
}

fn default_readiness_timeout() -> u64 {
    DEFAULT_READINESS_TIMEOUT_SECS
}

fn default_readiness_tag_key() -> String {
    DEFAULT_READINESS_TAG_KEY.to_string()
}

fn default_readiness_tag_value() -> String {
    DEFAULT_READINESS_TAG_VALUE.to_string()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
