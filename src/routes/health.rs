//! Health, readiness and liveness endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::AppState;

pub const SERVICE_NAME: &str = "face-api";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime: String,
    version: &'static str,
    service: &'static str,
}

/// GET /health - Service health summary
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        uptime: format!("{:?}", state.started_at.elapsed()),
        version: SERVICE_VERSION,
        service: SERVICE_NAME,
    })
}

/// GET /ready - Readiness probe
async fn ready() -> Json<serde_json::Value> {
    // The classifier model is loaded before the server binds, so reaching
    // this handler implies the pipeline is ready.
    Json(json!({
        "status": "ready",
        "timestamp": Utc::now(),
        "checks": { "classifier": "ok" },
    }))
}

/// GET /live - Liveness probe
async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive", "timestamp": Utc::now() }))
}

/// GET / - Service banner
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "status": "running",
    }))
}
