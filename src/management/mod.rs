//! Operator-Facing Status API
//!
//! Minimal axum surface exposing the engine's read-only stats through the
//! same `RwLock<Stats>` every other observer reads (spec §5). Not part of
//! the core's hard surface; a thin collaborator for operators polling
//! progress.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::checker::SharedStats;
use crate::metrics::CheckerMetrics;
use crate::proxy::ProxyRegistry;
use crate::Result;

#[derive(Clone)]
struct AppState {
    stats: SharedStats,
    registry: Arc<ProxyRegistry>,
    metrics: Arc<CheckerMetrics>,
    start_time: SystemTime,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct StatsBody {
    total_combos: usize,
    total_proxies: usize,
    valid: u64,
    invalid: u64,
    errors: u64,
    current_cpm: f64,
    active_workers: usize,
    working_proxies: usize,
    elapsed_seconds: f64,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthBody> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();
    Json(HealthBody {
        status: "healthy",
        uptime_seconds: uptime,
    })
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsBody> {
    let stats = state.stats.read().await;
    let working_proxies = state.registry.working_count().await;
    Json(StatsBody {
        total_combos: stats.total_combos,
        total_proxies: stats.total_proxies,
        valid: stats.valid,
        invalid: stats.invalid,
        errors: stats.errors,
        current_cpm: stats.current_cpm,
        active_workers: stats.active_workers,
        working_proxies,
        elapsed_seconds: stats.elapsed_seconds,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Builds the router serving `/health`, `/stats` and `/metrics`.
pub fn build_router(stats: SharedStats, registry: Arc<ProxyRegistry>, metrics: Arc<CheckerMetrics>) -> Router {
    let state = AppState {
        stats,
        registry,
        metrics,
        start_time: SystemTime::now(),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
}

/// Serves the status API until the process exits; callers typically
/// `tokio::spawn` this alongside the engine.
pub async fn serve(
    bind_addr: SocketAddr,
    stats: SharedStats,
    registry: Arc<ProxyRegistry>,
    metrics: Arc<CheckerMetrics>,
) -> Result<()> {
    let app = build_router(stats, registry, metrics);
    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "management API listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "management API server error");
        return Err(e.into());
    }
    Ok(())
}
