//! Chat platform API error types.
//!
//! The controller never retries a failed call inline: a failed mutation is counted
//! and the next cycle acts as the retry. The error therefore only needs to carry
//! enough detail for logs and for the few call sites that branch on the status
//! (a 404 on a member lookup means the member left).

use thiserror::Error;

/// A chat platform API error.
#[derive(Debug, Error)]
pub enum PlatformApiError {
    /// The platform answered with a non-success status.
    #[error("platform API error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect failure, timeout, ...).
    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("unexpected platform payload: {0}")]
    Decode(String),
}

impl PlatformApiError {
    /// Returns the HTTP status code, if the platform answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PlatformApiError::Status { status, .. } => Some(*status),
            PlatformApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            PlatformApiError::Decode(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
