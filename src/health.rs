// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Endpoint health checking.
//!
//! Probes a destination with TCP connect or HTTP(S) GET. Probe failures
//! (connection refused, timeouts, non-200 statuses) never propagate as
//! errors; they become unhealthy results carrying a diagnostic message, and
//! the coordinators translate them into state-machine flow.

use crate::config::{HealthCheckConfig, HealthProtocol};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Outcome of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHealth {
    /// Whether the endpoint answered as healthy
    pub healthy: bool,
    /// Protocol the probe used
    pub protocol: String,
    /// The probed endpoint
    pub endpoint: String,
    /// HTTP status, for HTTP-shaped probes
    pub status: Option<u16>,
    /// Diagnostic message for failed probes
    pub message: Option<String>,
}

/// Aggregate result of a health check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthResult {
    /// Per-endpoint outcomes
    pub endpoints: Vec<EndpointHealth>,
}

impl HealthResult {
    /// Healthy iff at least one endpoint was probed and every endpoint
    /// answered healthy.
    #[must_use]
    pub fn healthy(&self) -> bool {
        !self.endpoints.is_empty() && self.endpoints.iter().all(|e| e.healthy)
    }

    fn single(endpoint: EndpointHealth) -> Self {
        Self {
            endpoints: vec![endpoint],
        }
    }
}

/// Performs TCP and HTTP(S) liveness probes.
#[derive(Clone)]
pub struct HealthChecker {
    http: reqwest::Client,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    /// Create a checker with a fresh HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Probe a destination according to the health check configuration.
    pub async fn check(&self, destination: &str, config: &HealthCheckConfig) -> HealthResult {
        match config.protocol {
            HealthProtocol::Tcp => {
                self.tcp_check(destination, config.port, config.timeout_seconds)
                    .await
            }
            HealthProtocol::Http | HealthProtocol::Https => {
                let scheme = config.protocol.scheme().unwrap_or("http");
                self.http_check(
                    destination,
                    scheme,
                    config.port,
                    &config.path,
                    config.timeout_seconds,
                )
                .await
            }
        }
    }

    async fn tcp_check(&self, destination: &str, port: u16, timeout_secs: u64) -> HealthResult {
        let endpoint = format!("{destination}:{port}");
        debug!(endpoint = %endpoint, "Performing TCP health check");
        let connect = TcpStream::connect((destination, port));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), connect).await {
            Ok(Ok(_)) => HealthResult::single(EndpointHealth {
                healthy: true,
                protocol: "TCP".to_string(),
                endpoint,
                status: None,
                message: None,
            }),
            Ok(Err(e)) => {
                let msg = format!("Socket error: {e}");
                warn!(endpoint = %endpoint, error = %e, "TCP health check failed");
                HealthResult::single(EndpointHealth {
                    healthy: false,
                    protocol: "TCP".to_string(),
                    endpoint,
                    status: None,
                    message: Some(msg),
                })
            }
            Err(_) => {
                warn!(endpoint = %endpoint, timeout = timeout_secs, "TCP health check timed out");
                HealthResult::single(EndpointHealth {
                    healthy: false,
                    protocol: "TCP".to_string(),
                    endpoint,
                    status: None,
                    message: Some(format!("Connect timed out after {timeout_secs}s")),
                })
            }
        }
    }

    async fn http_check(
        &self,
        destination: &str,
        scheme: &str,
        port: u16,
        path: &str,
        timeout_secs: u64,
    ) -> HealthResult {
        let url = match url::Url::parse(&format!("{scheme}://{destination}:{port}{path}")) {
            Ok(url) => url,
            Err(e) => {
                warn!(destination = %destination, error = %e, "Invalid health check URL");
                return HealthResult::single(EndpointHealth {
                    healthy: false,
                    protocol: scheme.to_uppercase(),
                    endpoint: destination.to_string(),
                    status: None,
                    message: Some(format!("Invalid health check URL: {e}")),
                });
            }
        };
        debug!(url = %url, "Performing HTTP health check");
        let request = self
            .http
            .get(url.clone())
            .timeout(Duration::from_secs(timeout_secs))
            .send();
        match request.await {
            Ok(response) => {
                let status = response.status().as_u16();
                HealthResult::single(EndpointHealth {
                    healthy: status == 200,
                    protocol: scheme.to_uppercase(),
                    endpoint: destination.to_string(),
                    status: Some(status),
                    message: None,
                })
            }
            Err(e) => {
                warn!(url = %url, error = %e, "HTTP health check failed");
                HealthResult::single(EndpointHealth {
                    healthy: false,
                    protocol: scheme.to_uppercase(),
                    endpoint: destination.to_string(),
                    status: None,
                    message: Some(format!("HTTP check failed: {e}")),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
