//! Effect interpreter traits.
//!
//! These traits define how effects are executed. The production implementations
//! live in `crate::platform` and `crate::upstream`; tests use in-memory mocks from
//! `crate::test_utils`.
//!
//! # Example (mock for testing)
//!
//! ```ignore
//! struct EmptyGuild;
//!
//! impl PlatformInterpreter for EmptyGuild {
//!     type Error = std::convert::Infallible;
//!
//!     async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, Self::Error> {
//!         Ok(match effect {
//!             PlatformEffect::ListMembers => PlatformResponse::Members(vec![]),
//!             _ => PlatformResponse::Ok,
//!         })
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;

use super::platform::{PlatformEffect, PlatformResponse};
use super::upstream::{UpstreamEffect, UpstreamResponse};

/// Interprets platform effects against one guild.
pub trait PlatformInterpreter: Send + Sync + 'static {
    /// The error type returned by this interpreter.
    type Error: fmt::Display + Send;

    /// Execute a platform effect and return its response.
    fn interpret(
        &self,
        effect: PlatformEffect,
    ) -> impl Future<Output = Result<PlatformResponse, Self::Error>> + Send;
}

/// Interprets upstream profile service effects.
pub trait UpstreamInterpreter: Send + Sync + 'static {
    /// The error type returned by this interpreter.
    type Error: fmt::Display + Send;

    /// Execute an upstream effect and return its response.
    fn interpret(
        &self,
        effect: UpstreamEffect,
    ) -> impl Future<Output = Result<UpstreamResponse, Self::Error>> + Send;
}
