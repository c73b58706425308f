//! Manual sync trigger.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tokio::sync::mpsc::error::TrySendError;
use tracing::info;

use super::AppState;
use super::events::{EventError, verify_request};

/// `POST /api/v1/sync/run`
///
/// Requests an out-of-band cycle. The body is opaque but must be signed like an
/// event push.
///
/// - 202 Accepted: a cycle is queued (or one already was)
/// - 401 Unauthorized: signature missing or wrong
/// - 503 Service Unavailable: the scheduler is not running
pub async fn run_sync_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), EventError> {
    verify_request(&headers, &body, app_state.event_secret())?;

    match app_state.sync_tx().try_send(()) {
        Ok(()) => info!("Manual sync queued"),
        Err(TrySendError::Full(())) => info!("Manual sync already pending"),
        Err(TrySendError::Closed(())) => return Err(EventError::SchedulerUnavailable),
    }
    Ok((StatusCode::ACCEPTED, "Accepted"))
}
