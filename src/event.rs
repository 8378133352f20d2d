// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle event model.
//!
//! A lifecycle event describes one instance entering or leaving a scaling
//! group, or a reconciliation pass over a whole group. Events arrive as the
//! inner JSON object of a notification envelope (see [`crate::handlers`]) and
//! carry the provider's origin/destination pair, from which the transition is
//! derived.

use crate::errors::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The state change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleTransition {
    /// An instance is joining the scaling group
    Launching,
    /// An instance is leaving the scaling group
    Draining,
    /// A full state reconciliation over a scaling group
    Reconciling,
    /// A notification that does not concern record management
    Unrelated,
}

impl fmt::Display for LifecycleTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Launching => "LAUNCHING",
            Self::Draining => "DRAINING",
            Self::Reconciling => "RECONCILING",
            Self::Unrelated => "UNRELATED",
        };
        write!(f, "{name}")
    }
}

/// Result the coordinator acknowledges a lifecycle hook with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Let the scaling operation proceed
    Continue,
    /// Abandon the scaling operation
    Abandon,
}

impl LifecycleAction {
    /// Provider wire value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Abandon => "ABANDON",
        }
    }
}

/// One lifecycle event, as consumed by the coordinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Derived transition driving the planning branch
    pub transition: LifecycleTransition,
    /// Scaling group the event concerns
    pub scaling_group_name: String,
    /// Instance the event concerns; empty for RECONCILING
    pub instance_id: String,
    /// Lifecycle hook to acknowledge; empty for RECONCILING
    pub lifecycle_hook_name: String,
    /// Token identifying the in-flight lifecycle action
    pub lifecycle_action_token: String,
    /// Origin state reported by the provider
    pub origin: String,
    /// Destination state reported by the provider
    pub destination: String,
    /// Service that emitted the notification
    pub service: String,
    /// Raw provider transition string, kept for logging
    pub lifecycle_transition: String,
}

impl LifecycleEvent {
    /// Build a synthetic RECONCILING event for one scaling group.
    #[must_use]
    pub fn reconciling(scaling_group_name: &str) -> Self {
        Self {
            transition: LifecycleTransition::Reconciling,
            scaling_group_name: scaling_group_name.to_string(),
            instance_id: String::new(),
            lifecycle_hook_name: String::new(),
            lifecycle_action_token: String::new(),
            origin: String::new(),
            destination: String::new(),
            service: String::new(),
            lifecycle_transition: String::new(),
        }
    }

    /// Build an event from the inner notification object.
    ///
    /// The transition is derived from the origin/destination pair; unknown
    /// combinations yield [`LifecycleTransition::Unrelated`], which the
    /// lifecycle coordinator acknowledges without touching any record.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Business`] when a LAUNCHING or DRAINING
    /// event is missing its instance id, scaling group name, or hook name.
    pub fn from_notification(message: &serde_json::Value) -> Result<Self, DiscoveryError> {
        let field = |name: &str| -> String {
            message
                .get(name)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let origin = field("Origin");
        let destination = field("Destination");
        let event = Self {
            transition: Self::determine_transition(&origin, &destination),
            scaling_group_name: field("AutoScalingGroupName"),
            instance_id: field("EC2InstanceId"),
            lifecycle_hook_name: field("LifecycleHookName"),
            lifecycle_action_token: field("LifecycleActionToken"),
            origin,
            destination,
            service: field("Service"),
            lifecycle_transition: field("LifecycleTransition"),
        };
        event.validate()?;
        Ok(event)
    }

    /// Derive the transition from the provider's origin/destination pair.
    ///
    /// | origin | destination | transition |
    /// |---|---|---|
    /// | EC2 or WarmPool | AutoScalingGroup | LAUNCHING |
    /// | AutoScalingGroup | EC2 or WarmPool | DRAINING |
    /// | anything else | anything else | UNRELATED |
    #[must_use]
    pub fn determine_transition(origin: &str, destination: &str) -> LifecycleTransition {
        let pool = |s: &str| s == "EC2" || s == "WarmPool";
        if pool(origin) && destination == "AutoScalingGroup" {
            LifecycleTransition::Launching
        } else if origin == "AutoScalingGroup" && pool(destination) {
            LifecycleTransition::Draining
        } else {
            LifecycleTransition::Unrelated
        }
    }

    /// Check the field requirements for this event's transition.
    ///
    /// LAUNCHING and DRAINING require an instance id, a scaling group name,
    /// and a hook name; RECONCILING requires the scaling group name only.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Business`] naming the missing field.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        let require = |name: &str, value: &str| {
            if value.is_empty() {
                Err(DiscoveryError::Business(format!(
                    "{name} is required for {} transition",
                    self.transition
                )))
            } else {
                Ok(())
            }
        };
        match self.transition {
            LifecycleTransition::Launching | LifecycleTransition::Draining => {
                require("instance id", &self.instance_id)?;
                require("scaling group name", &self.scaling_group_name)?;
                require("lifecycle hook name", &self.lifecycle_hook_name)?;
            }
            LifecycleTransition::Reconciling => {
                require("scaling group name", &self.scaling_group_name)?;
            }
            LifecycleTransition::Unrelated => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod event_tests;
