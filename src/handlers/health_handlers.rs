//! Liveness probe.
//!
//! - GET /api/health -> `{"status":"ok"}`, no authentication, no I/O

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}
