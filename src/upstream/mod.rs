//! Upstream profile service client and effect interpreter.
//!
//! The profile service exposes one JSON endpoint per eligibility class under
//! `/api/sync/`, an endpoint listing the active range groups, and a write-back
//! endpoint for the booster flag. Every call carries the `x-api-key` header.

mod client;
mod error;
mod interpreter;

pub use client::ProfileClient;
pub use error::UpstreamApiError;
pub use interpreter::interpret_upstream_effect;
