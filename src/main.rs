// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use flockdns::constants::{METRICS_SERVER_PATH, SERVER_BIND_ADDRESS, TOKIO_WORKER_THREADS};
use flockdns::context::AppContext;
use flockdns::handlers::{handle_lifecycle, handle_reconciliation};
use flockdns::metrics;
use flockdns::settings::Settings;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Service-discovery DNS controller.
#[derive(Parser, Debug)]
#[command(name = "flockdns", version, about)]
struct Args {
    /// Address the HTTP server binds to
    #[arg(long, default_value = SERVER_BIND_ADDRESS)]
    bind: String,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("flockdns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, falling back to the
/// `log-level` variable, otherwise defaults to INFO level. Respects
/// `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("log-level").map(tracing_subscriber::EnvFilter::new)
        })
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting flockdns controller");
    debug!("Logging initialized with file and line number tracking");
}

async fn async_main() -> Result<()> {
    let args = Args::parse();
    initialize_logging();

    let settings = Settings::from_env();
    info!(
        cloud_provider = %settings.cloud_provider,
        log_identifier = %settings.log_identifier,
        what_if = settings.reconciliation.what_if,
        max_concurrency = settings.reconciliation.max_concurrency,
        "Settings resolved"
    );

    let ctx = AppContext::from_settings(settings).map_err(|e| {
        error!(error = %e, "Failed to build provider context");
        anyhow::anyhow!(e.to_string())
    })?;

    let app = Router::new()
        .route("/lifecycle", post(lifecycle_endpoint))
        .route("/reconcile", post(reconcile_endpoint))
        .route(METRICS_SERVER_PATH, get(metrics_endpoint))
        .route("/healthz", get(healthz_endpoint))
        .with_state(ctx);

    info!(bind = %args.bind, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install shutdown signal handler");
    }
    info!("Shutdown signal received");
}

async fn lifecycle_endpoint(
    State(ctx): State<Arc<AppContext>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let response = handle_lifecycle(ctx, &payload).await;
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}

async fn reconcile_endpoint(
    State(ctx): State<Arc<AppContext>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let response = handle_reconciliation(ctx, &payload).await;
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}

async fn metrics_endpoint() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn healthz_endpoint() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
