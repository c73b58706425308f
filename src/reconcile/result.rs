//! Per-class cycle outcomes and the "last sync" status served to operators.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Counters for one class in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCycleResult {
    pub class: String,

    /// Tags added this cycle.
    pub assigned: usize,

    /// Tags removed this cycle.
    pub removed: usize,

    /// Desired (member, tag) pairs that were already in place.
    pub already_has: usize,

    /// Failed mutations, provisioning failures and failed write-backs.
    pub errors: usize,

    /// Distinct linked members the rule accepted.
    pub eligible: usize,

    /// Eligible members present in the guild.
    pub in_guild: usize,

    /// Eligible members absent from the guild; skipped.
    pub not_in_guild: usize,

    /// Booster flags written back to the upstream.
    #[serde(default)]
    pub written_back: usize,

    /// Removals were suspended because the eligible set looked anomalously empty.
    pub guard_tripped: bool,

    /// Set when the class could not run at all this cycle.
    pub fetch_error: Option<String>,

    pub finished_at: DateTime<Utc>,
}

impl SyncCycleResult {
    pub fn new(class: impl Into<String>) -> Self {
        SyncCycleResult {
            class: class.into(),
            assigned: 0,
            removed: 0,
            already_has: 0,
            errors: 0,
            eligible: 0,
            in_guild: 0,
            not_in_guild: 0,
            written_back: 0,
            guard_tripped: false,
            fetch_error: None,
            finished_at: Utc::now(),
        }
    }

    /// A result for a class that was skipped because a fetch failed.
    pub fn fetch_failed(class: impl Into<String>, error: impl Into<String>) -> Self {
        SyncCycleResult {
            fetch_error: Some(error.into()),
            ..Self::new(class)
        }
    }

    /// Stamps the completion time.
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// True when the class ran and every operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.fetch_error.is_none() && self.errors == 0
    }
}

/// Snapshot of the controller's progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
    pub running: bool,
    /// Last result per class, overwritten each cycle.
    pub classes: BTreeMap<String, SyncCycleResult>,
}

/// Shared handle to the sync status.
#[derive(Debug, Clone, Default)]
pub struct SyncStatusStore {
    inner: Arc<RwLock<SyncStatus>>,
}

impl SyncStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> SyncStatus {
        self.inner.read().await.clone()
    }

    pub async fn begin_cycle(&self) {
        self.inner.write().await.running = true;
    }

    /// Records a finished cycle. Classes missing from `results` keep their
    /// previous entry (a cycle stopped early on shutdown).
    pub async fn finish_cycle(&self, results: &[SyncCycleResult]) {
        let mut status = self.inner.write().await;
        for result in results {
            status.classes.insert(result.class.clone(), result.clone());
        }
        status.running = false;
        status.cycles_completed += 1;
        status.last_cycle_at = Some(Utc::now());
    }
}
