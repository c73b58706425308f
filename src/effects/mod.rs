//! Effects-as-data for platform and upstream operations.
//!
//! Every external call the controller makes is described by an effect value and
//! executed by an interpreter. This keeps the reconciliation engine independent of
//! HTTP details and lets tests observe exactly which mutations a cycle issued.

pub mod interpreter;
pub mod platform;
pub mod upstream;

pub use interpreter::{PlatformInterpreter, UpstreamInterpreter};
pub use platform::{PlatformEffect, PlatformResponse, TagData};
pub use upstream::{UpstreamEffect, UpstreamResponse};
