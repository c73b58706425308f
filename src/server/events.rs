//! Member-joined event endpoint.
//!
//! Verifies the signature, parses the event and hands the member to the join
//! worker. The fast path itself runs asynchronously; the handler answers 202 as
//! soon as the event is queued.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::AppState;
use super::signature::{SIGNATURE_HEADER, verify_signature};
use crate::types::MemberId;

/// Body of a member-joined push.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberJoinedEvent {
    pub member_id: MemberId,
}

/// Rejections from the signed push endpoints.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid event body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("join queue is full")]
    Busy,

    #[error("join worker is not running")]
    Unavailable,

    #[error("scheduler is not running")]
    SchedulerUnavailable,
}

impl IntoResponse for EventError {
    fn into_response(self) -> Response {
        let status = match &self {
            EventError::MissingSignature | EventError::InvalidSignature => StatusCode::UNAUTHORIZED,
            EventError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            EventError::Busy | EventError::Unavailable | EventError::SchedulerUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// `POST /events/member-joined`
///
/// - 202 Accepted: queued for the fast path
/// - 400 Bad Request: body is not a member-joined event
/// - 401 Unauthorized: signature missing or wrong
/// - 503 Service Unavailable: queue full or worker stopped
pub async fn member_joined_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), EventError> {
    // Checked before the body is parsed.
    verify_request(&headers, &body, app_state.event_secret())?;

    let event: MemberJoinedEvent = serde_json::from_slice(&body)?;
    debug!(member = %event.member_id, "Member-joined event received");

    app_state
        .join_tx()
        .try_send(event.member_id.clone())
        .map_err(|e| match e {
            TrySendError::Full(_) => EventError::Busy,
            TrySendError::Closed(_) => EventError::Unavailable,
        })?;

    info!(member = %event.member_id, "Member-joined event queued");
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Checks the `x-signature-256` header against the raw body.
pub(super) fn verify_request(
    headers: &HeaderMap,
    body: &[u8],
    secret: &[u8],
) -> Result<(), EventError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(EventError::MissingSignature)?;

    if !verify_signature(body, signature, secret) {
        warn!("Invalid request signature");
        return Err(EventError::InvalidSignature);
    }
    Ok(())
}
