//! Diagnostics and liveness endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use super::AppState;
use crate::reconcile::SyncStatus;

/// `GET /api/v1/sync/status`: the last cycle's timestamp and per-class counters.
pub async fn status_handler(State(app_state): State<AppState>) -> Json<SyncStatus> {
    Json(app_state.status().snapshot().await)
}

/// `GET /health`: 200 while the process is serving.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
