// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Flockdns - Service Discovery DNS Controller
//!
//! Flockdns is a controller written in Rust that keeps authoritative DNS
//! records synchronized with the live membership of cloud scaling groups.
//!
//! ## Overview
//!
//! This library provides the core functionality of the controller, including:
//!
//! - A per-record change planner that diffs desired against observed state
//! - Lifecycle event coordination (instances launching and draining)
//! - Bulk reconciliation sweeps with bounded concurrency
//! - KV-backed advisory locking that serializes writers per record
//! - Readiness and health gating for contributing instances
//!
//! ## Modules
//!
//! - [`planner`] - Desired-vs-observed diffing into change requests
//! - [`lifecycle`] - Orchestration of a single lifecycle event
//! - [`reconciler`] - Manual and bulk reconciliation coordination
//! - [`lock`] - Distributed advisory locks over the KV repository
//! - [`providers`] - Cloud provider trait seams
//!
//! ## Example
//!
//! ```rust,no_run
//! use flockdns::context::AppContext;
//! use flockdns::settings::Settings;
//!
//! // Build the component graph once at startup
//! let (_ctx, backends) = AppContext::mock(Settings::from_env());
//! backends.dns.add_zone("Z1", "example.com");
//! ```
//!
//! ## Guarantees
//!
//! - **At most one writer per record** - changes for the same record are
//!   serialized through a KV-backed advisory lock
//! - **Idempotent planning** - applying a planned change and replanning
//!   yields IGNORE
//! - **Managed record safety** - externally-owned records are never deleted,
//!   only parked on their mock value

pub mod applier;
pub mod change;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod event;
pub mod handlers;
pub mod health;
pub mod lifecycle;
pub mod lock;
pub mod memory;
pub mod metadata;
pub mod metrics;
pub mod planner;
pub mod providers;
pub mod readiness;
pub mod reconciler;
pub mod repository;
pub mod retry;
pub mod settings;
