//! HTTP surface of the controller.
//!
//! # Endpoints
//!
//! - `POST /events/member-joined` - Signed member-joined push (returns 202 Accepted)
//! - `POST /api/v1/sync/run` - Signed manual sync trigger (returns 202 Accepted)
//! - `GET /api/v1/sync/status` - Last cycle timestamp and per-class counters as JSON
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

pub mod events;
pub mod signature;
pub mod status;
pub mod trigger;

pub use events::{EventError, MemberJoinedEvent, member_joined_handler};
pub use signature::{SIGNATURE_HEADER, verify_signature};
pub use status::{health_handler, status_handler};
pub use trigger::run_sync_handler;

use crate::reconcile::SyncStatusStore;
use crate::types::MemberId;

/// Shared application state, passed to handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    status: SyncStatusStore,

    /// Feeds the join worker.
    join_tx: mpsc::Sender<MemberId>,

    /// Feeds the scheduler's trigger worker.
    sync_tx: mpsc::Sender<()>,

    /// Secret for HMAC-SHA256 event signature verification.
    event_secret: Vec<u8>,
}

impl AppState {
    /// Creates the shared state.
    ///
    /// # Arguments
    ///
    /// * `status` - Status store the controller updates after each cycle
    /// * `join_tx` - Sender feeding the join worker
    /// * `sync_tx` - Sender feeding the scheduler's trigger worker
    /// * `event_secret` - Shared secret for request signatures
    ///
    /// # Examples
    ///
    /// ```
    /// use role_sync::reconcile::SyncStatusStore;
    /// use role_sync::server::{AppState, build_router};
    /// use tokio::sync::mpsc;
    ///
    /// let (join_tx, _join_rx) = mpsc::channel(16);
    /// let (sync_tx, _sync_rx) = mpsc::channel(1);
    /// let state = AppState::new(SyncStatusStore::new(), join_tx, sync_tx, b"secret".to_vec());
    /// assert_eq!(state.event_secret(), b"secret");
    /// let _router = build_router(state);
    /// ```
    pub fn new(
        status: SyncStatusStore,
        join_tx: mpsc::Sender<MemberId>,
        sync_tx: mpsc::Sender<()>,
        event_secret: impl Into<Vec<u8>>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                status,
                join_tx,
                sync_tx,
                event_secret: event_secret.into(),
            }),
        }
    }

    pub fn status(&self) -> &SyncStatusStore {
        &self.inner.status
    }

    pub fn join_tx(&self) -> &mpsc::Sender<MemberId> {
        &self.inner.join_tx
    }

    pub fn sync_tx(&self) -> &mpsc::Sender<()> {
        &self.inner.sync_tx
    }

    pub fn event_secret(&self) -> &[u8] {
        &self.inner.event_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/events/member-joined", post(member_joined_handler))
        .route("/api/v1/sync/run", post(run_sync_handler))
        .route("/api/v1/sync/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
