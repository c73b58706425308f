//! Chat platform client and effect interpreter.
//!
//! This module implements `PlatformInterpreter` over the platform's guild REST API
//! using `reqwest`. Every request carries the client-wide timeout; failures are
//! returned to the caller, which decides whether to count, skip or abort.

mod client;
mod error;
mod interpreter;

pub use client::GuildClient;
pub use error::PlatformApiError;
pub use interpreter::interpret_platform_effect;
