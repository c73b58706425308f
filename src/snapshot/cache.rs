//! Time-boxed cache of the expensive reads.
//!
//! Each slot holds the last successful fetch and the instant it completed. A read
//! within the TTL returns the cached value; otherwise exactly one refresh runs while
//! the slot's lock is held, so concurrent callers wait for that refresh instead of
//! issuing their own. A failed refresh is returned as an error and leaves the slot
//! expired, so the next caller tries again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::types::{DynamicGroup, EligibilityRecord, Member};

use super::roster::{Roster, TagChange};

/// Default time-to-live of every slot (5 minutes).
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: Arc<T>) -> Self {
        Cached {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Looks up `slot`, refreshing it with `fetch` when missing or expired.
async fn get_or_refresh<T, F, Fut, E>(
    slot: &mut Option<Cached<T>>,
    ttl: Duration,
    fetch: F,
) -> Result<Arc<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(cached) = slot.as_ref()
        && cached.is_fresh(ttl)
    {
        trace!("Snapshot cache hit");
        return Ok(Arc::clone(&cached.value));
    }

    let value = Arc::new(fetch().await?);
    *slot = Some(Cached::new(Arc::clone(&value)));
    Ok(value)
}

/// Snapshot cache shared by every reconciler and the join-time fast path.
#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    roster: Mutex<Option<Cached<Roster>>>,
    eligibility: Mutex<HashMap<String, Cached<Vec<EligibilityRecord>>>>,
    groups: Mutex<Option<Cached<Vec<DynamicGroup>>>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_TTL)
    }
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        SnapshotCache {
            ttl,
            roster: Mutex::new(None),
            eligibility: Mutex::new(HashMap::new()),
            groups: Mutex::new(None),
        }
    }

    /// Returns the guild roster, refreshing it with `fetch` if stale.
    pub async fn roster<F, Fut, E>(&self, fetch: F) -> Result<Arc<Roster>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Roster, E>>,
    {
        let mut slot = self.roster.lock().await;
        get_or_refresh(&mut slot, self.ttl, fetch).await
    }

    /// Returns the records of one eligibility endpoint, refreshing them if stale.
    ///
    /// Classes sharing an endpoint share the slot.
    pub async fn eligibility<F, Fut, E>(
        &self,
        endpoint: &str,
        fetch: F,
    ) -> Result<Arc<Vec<EligibilityRecord>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<EligibilityRecord>, E>>,
    {
        let mut slots = self.eligibility.lock().await;
        let mut slot = slots.remove(endpoint);
        let result = get_or_refresh(&mut slot, self.ttl, fetch).await;
        if let Some(slot) = slot {
            slots.insert(endpoint.to_string(), slot);
        }
        result
    }

    /// Returns the active range groups, refreshing them if stale.
    pub async fn groups<F, Fut, E>(&self, fetch: F) -> Result<Arc<Vec<DynamicGroup>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<DynamicGroup>, E>>,
    {
        let mut slot = self.groups.lock().await;
        get_or_refresh(&mut slot, self.ttl, fetch).await
    }

    /// Writes acknowledged tag mutations through to the cached roster.
    ///
    /// Does not extend the slot's lifetime.
    pub async fn apply(&self, changes: &[TagChange]) {
        if changes.is_empty() {
            return;
        }
        let mut slot = self.roster.lock().await;
        if let Some(cached) = slot.as_mut() {
            Arc::make_mut(&mut cached.value).apply(changes);
            debug!(changes = changes.len(), "Applied tag changes to cached roster");
        }
    }

    /// Inserts or replaces one member in the cached roster, if one is cached.
    pub async fn upsert_member(&self, member: Member) {
        let mut slot = self.roster.lock().await;
        if let Some(cached) = slot.as_mut() {
            Arc::make_mut(&mut cached.value).upsert(member);
        }
    }
}
