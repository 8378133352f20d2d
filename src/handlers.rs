// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Invocation entrypoints.
//!
//! Two handlers, one per trigger: lifecycle notifications (an SNS-shaped
//! envelope wrapping the provider's lifecycle message) and reconciliation
//! invocations (manual single-record or bulk). Both return the uniform
//! [`HandlerResponse`] shape; errors are mapped to status codes here and
//! never propagate further.

use crate::constants::TEST_NOTIFICATION_EVENT;
use crate::context::AppContext;
use crate::event::LifecycleEvent;
use crate::lifecycle::LifecycleCoordinator;
use crate::reconciler::ReconciliationCoordinator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Uniform response shape returned by every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    /// HTTP-style status code
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Human-readable outcome description
    pub body: String,
    /// Whether the core completed its state transition successfully
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,
}

impl HandlerResponse {
    fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            handled: None,
        }
    }

    fn with_handled(status_code: u16, body: impl Into<String>, handled: bool) -> Self {
        Self {
            status_code,
            body: body.into(),
            handled: Some(handled),
        }
    }
}

/// Handle one lifecycle notification envelope.
///
/// The envelope is `{"Records": [{"Sns": {"Message": "<stringified JSON>"}}]}`.
/// Test notifications return 200 without side effects, envelopes without a
/// `LifecycleTransition` return 400, and any other parse failure returns 500.
pub async fn handle_lifecycle(
    ctx: Arc<AppContext>,
    payload: &serde_json::Value,
) -> HandlerResponse {
    debug!(payload = %payload, "Received lifecycle event");

    let message = payload
        .get("Records")
        .and_then(|records| records.get(0))
        .and_then(|record| record.get("Sns"))
        .and_then(|sns| sns.get("Message"))
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());

    let Some(message) = message else {
        warn!("No notification found in the event object");
        return HandlerResponse::new(500, "No notification found in the event object");
    };

    if message
        .get("Event")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|event| event == TEST_NOTIFICATION_EVENT)
    {
        info!("Received test notification event");
        return HandlerResponse::new(200, "Test notification received");
    }

    if message.get("LifecycleTransition").is_none() {
        warn!("No lifecycle transition found in the notification, ignoring");
        return HandlerResponse::new(400, "No lifecycle transition found in the notification");
    }

    let event = match LifecycleEvent::from_notification(&message) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Error creating lifecycle event");
            return HandlerResponse::new(500, format!("Error creating lifecycle event: {e}"));
        }
    };

    info!(
        group = %event.scaling_group_name,
        instance = %event.instance_id,
        transition = %event.transition,
        "Handling lifecycle event"
    );
    match LifecycleCoordinator::new(ctx).handle(&event).await {
        Ok(handled) => {
            if handled {
                info!("Lifecycle event handled successfully");
            } else {
                warn!("Lifecycle event not handled");
            }
            HandlerResponse::with_handled(200, "Lifecycle action completed", handled)
        }
        Err(e) => {
            warn!(error = %e, "Error handling lifecycle event");
            HandlerResponse::new(e.status_code(), format!("Error handling lifecycle event: {e}"))
        }
    }
}

/// Handle one reconciliation invocation.
///
/// With `manual_sync` set to `"true"` (case-insensitive), the four further
/// fields identify a single record to reconcile synchronously; otherwise a
/// bulk sweep over all configurations runs.
pub async fn handle_reconciliation(
    ctx: Arc<AppContext>,
    payload: &serde_json::Value,
) -> HandlerResponse {
    debug!(payload = %payload, "Received reconciliation event");

    if is_manual_sync(payload) {
        return handle_manual_sync(ctx, payload).await;
    }

    match ReconciliationCoordinator::new(ctx).reconcile_all().await {
        Ok(outcomes) => {
            let failures = outcomes.iter().filter(|o| o.error.is_some()).count();
            if failures > 0 {
                warn!(
                    groups = outcomes.len(),
                    failures = failures,
                    "Bulk reconciliation finished with failures"
                );
            }
            HandlerResponse::new(200, "Reconciliation process finished.")
        }
        Err(e) => {
            warn!(error = %e, "Bulk reconciliation failed");
            HandlerResponse::new(e.status_code(), format!("Reconciliation failed: {e}"))
        }
    }
}

async fn handle_manual_sync(
    ctx: Arc<AppContext>,
    payload: &serde_json::Value,
) -> HandlerResponse {
    let field = |name: &str| -> String {
        payload
            .get(name)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let group = field("asg_name");
    let zone_id = field("hosted_zone_id");
    let record_name = field("record_name");
    let record_type = field("record_type");
    info!(
        group = %group,
        zone = %zone_id,
        record = %record_name,
        record_type = %record_type,
        "Starting manual reconciliation"
    );

    let configs = match ctx.scaling_group_configs().await {
        Ok(configs) => configs,
        Err(e) => {
            return HandlerResponse::new(e.status_code(), format!("Reconciliation failed: {e}"))
        }
    };
    let Some(config) = configs
        .find_record(&group, &zone_id, &record_name, &record_type)
        .cloned()
    else {
        warn!(
            group = %group,
            zone = %zone_id,
            record = %record_name,
            "Invalid manual sync request, no matching configuration"
        );
        return HandlerResponse::new(
            400,
            "Invalid manual sync request. No configuration found matching the request parameters.",
        );
    };

    match ReconciliationCoordinator::new(ctx)
        .reconcile_group(std::slice::from_ref(&config))
        .await
    {
        Ok(()) => HandlerResponse::new(200, "Reconciliation process finished for arguments provided."),
        Err(e) => HandlerResponse::new(
            500,
            format!("Error processing configuration for: {group} -> {e}"),
        ),
    }
}

fn is_manual_sync(payload: &serde_json::Value) -> bool {
    match payload.get("manual_sync") {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod handlers_tests;
