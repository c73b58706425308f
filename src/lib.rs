//! Role Sync - keeps a guild's member tags in line with an upstream profile service.
//!
//! A periodic reconciliation loop computes the desired tag holders for each
//! configured role class and applies the difference; a member-joined fast path
//! grants tags to new arrivals without waiting for the next cycle.

pub mod config;
pub mod effects;
pub mod join;
pub mod notify;
pub mod platform;
pub mod provision;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod snapshot;
pub mod types;
pub mod upstream;

#[cfg(test)]
pub mod test_utils;
