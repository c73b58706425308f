//! Snapshot cache of the guild roster, eligibility records and range groups.
//!
//! A reconciliation cycle reads the roster once and every class reads its
//! eligibility records through the same cache, so one cycle costs one roster
//! fetch plus one fetch per distinct endpoint.

mod cache;
mod roster;

pub use cache::{DEFAULT_SNAPSHOT_TTL, SnapshotCache};
pub use roster::{Roster, TagChange};
