//! Pull endpoint for the metrics backend.

use crate::collector::CollectorState;
use crate::error::Result;
use crate::metrics::{CollectorStats, MetricSet, StatsSnapshot};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ServerState {
    metrics: MetricSet,
    stats: CollectorStats,
    collector: watch::Receiver<CollectorState>,
}

impl ServerState {
    pub fn new(metrics: MetricSet, stats: CollectorStats, collector: watch::Receiver<CollectorState>) -> Self {
        Self {
            metrics,
            stats,
            collector,
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    state: CollectorState,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<ServerState>) -> Response {
    match state.metrics.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn health_handler(State(state): State<ServerState>) -> Json<Health> {
    let current = *state.collector.borrow();
    Json(Health { state: current })
}

async fn stats_handler(State(state): State<ServerState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

/// Serves until `cancel` fires.
pub async fn serve(listener: TcpListener, state: ServerState, cancel: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Serving metrics on http://{}/metrics", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
