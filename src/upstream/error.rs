//! Upstream profile service error types.

use thiserror::Error;

/// An upstream profile service error.
///
/// Any of these makes the affected class count as "fetch failed this cycle".
#[derive(Debug, Error)]
pub enum UpstreamApiError {
    /// The service answered with a non-success status.
    #[error("upstream API error (HTTP {status}) on {path}")]
    Status { status: u16, path: String },

    /// The request never produced a response.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("unexpected upstream payload on {path}: {message}")]
    Decode { path: String, message: String },
}
