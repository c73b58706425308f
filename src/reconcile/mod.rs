//! Role class reconciliation.
//!
//! One parametrized engine drives every class: [`rules`] turns upstream records
//! into desired holder sets, [`plan`] diffs them against the roster, and the
//! [`Controller`] applies the result and records per-class counters.

mod booster;
mod controller;
mod engine;
pub mod plan;
mod result;
pub mod rules;


pub use booster::booster_corrections;
pub use controller::{Controller, SyncError, audit_reason};
pub use plan::{ClassPlan, ManagedTag, plan_class};
pub use result::{SyncCycleResult, SyncStatus, SyncStatusStore};
pub use rules::{Desired, Target, desired_targets};
