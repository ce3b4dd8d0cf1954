//! System endpoints: health check and rate catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::RateDto;
use crate::app_state::AppState;
use crate::domain::projection::RATE_BENCHMARKS;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    store: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, store backend and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store.backend().to_string(),
        }),
    )
}

/// `GET /config/rates` — Annual rate benchmarks used by the projections.
#[utoipa::path(
    get,
    path = "/config/rates",
    tag = "System",
    summary = "List rate benchmarks",
    description = "Returns the Savium rate alongside mutual funds, debt funds, bank deposits and inflation.",
    responses(
        (status = 200, description = "Rate catalog", body = Vec<RateDto>),
    )
)]
pub async fn rates_handler() -> impl IntoResponse {
    let rates: Vec<RateDto> = RATE_BENCHMARKS.iter().map(RateDto::from).collect();
    (StatusCode::OK, Json(rates))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/rates", get(rates_handler))
}
