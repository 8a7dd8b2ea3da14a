//! HTTP API surface
//!
//! Routes:
//! - `POST /api/add` admits a credential record to the pool
//! - `POST /api/claim` leases the oldest available record
//! - `POST /api/release` returns a lease to the pool
//! - `GET /api/status` snapshots both sets
//! - `GET /health` liveness with pool counts
//! - `GET /metrics` Prometheus exposition
//!
//! Every engine error maps to a stable HTTP status and a
//! `{"error": {"type", "message"}}` body, so callers can branch on the
//! machine-readable kind instead of parsing messages.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use rdp_pool::{Error, FilePoolEngine};
use serde::Deserialize;
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;

use crate::metrics::record_request;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<FilePoolEngine>,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

/// Build the application router with a bounded number of in-flight requests.
pub fn build_router(state: ApiState, max_connections: usize) -> Router {
    Router::new()
        .route("/api/add", post(add_credential))
        .route("/api/claim", post(claim_credential))
        .route("/api/release", post(release_credential))
        .route("/api/status", get(pool_status))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Body of `POST /api/add`. Fields default to empty so a missing field
/// surfaces as a validation error rather than a deserialization failure.
#[derive(Debug, Deserialize)]
struct AddRequest {
    #[serde(default)]
    ip: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Body of `POST /api/release`.
#[derive(Debug, Deserialize)]
struct ReleaseRequest {
    #[serde(default)]
    lease_id: String,
}

async fn add_credential(
    State(state): State<ApiState>,
    Json(body): Json<AddRequest>,
) -> Response {
    let started = Instant::now();
    let response = match state
        .engine
        .add(&body.ip, &body.username, &body.password)
        .await
    {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(err) => error_response(err),
    };
    record_request("/api/add", response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

async fn claim_credential(State(state): State<ApiState>) -> Response {
    let started = Instant::now();
    let response = match state.engine.claim().await {
        Ok(lease) => (StatusCode::OK, Json(lease)).into_response(),
        Err(err) => error_response(err),
    };
    record_request("/api/claim", response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

async fn release_credential(
    State(state): State<ApiState>,
    Json(body): Json<ReleaseRequest>,
) -> Response {
    let started = Instant::now();
    let response = match state.engine.release(&body.lease_id).await {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({ "ip": record.ip, "username": record.username })),
        )
            .into_response(),
        Err(err) => error_response(err),
    };
    record_request("/api/release", response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

async fn pool_status(State(state): State<ApiState>) -> Response {
    let started = Instant::now();
    let response = match state.engine.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err),
    };
    record_request("/api/status", response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

/// Liveness probe. Reports degraded (503) when the pool state cannot be
/// read, since every operation would fail the same way.
async fn health(State(state): State<ApiState>) -> Response {
    let uptime = state.started_at.elapsed().as_secs();
    match state.engine.status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "available": status.available_count,
                "leased": status.leased_count,
                "uptime_seconds": uptime,
            })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "error": err.to_string(),
                "uptime_seconds": uptime,
            })),
        )
            .into_response(),
    }
}

async fn render_metrics(State(state): State<ApiState>) -> String {
    state.prometheus.render()
}

/// Map an engine error to its HTTP status and error body.
fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Duplicate(_) => StatusCode::CONFLICT,
        Error::PoolExhausted | Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "error": {
            "type": err.kind(),
            "message": err.to_string(),
        }
    });
    (status, Json(body)).into_response()
}
