//! The controller object: owns every piece of shared reconciliation state.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::effects::{
    PlatformEffect, PlatformInterpreter, PlatformResponse, UpstreamEffect, UpstreamInterpreter,
    UpstreamResponse,
};
use crate::notify::NotificationDispatcher;
use crate::provision::TagProvisioner;
use crate::snapshot::{DEFAULT_SNAPSHOT_TTL, Roster, SnapshotCache, TagChange};
use crate::types::{DynamicGroup, EligibilityRecord, Member, MemberId, RoleClassDefinition};

use super::result::SyncStatusStore;

/// A failed external read. Scoped to one class, or to the whole cycle for the roster.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("fetching guild roster failed: {0}")]
    Roster(String),

    #[error("fetching eligibility from {endpoint} failed: {message}")]
    Eligibility { endpoint: String, message: String },

    #[error("fetching dynamic groups failed: {0}")]
    Groups(String),

    #[error("platform call failed: {0}")]
    Platform(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

/// Runs role classes against one guild.
///
/// Scheduled cycles and the join-time fast path share the snapshot cache, the
/// tag provisioner and the status store through one `Controller`.
pub struct Controller<P, U> {
    pub(super) platform: Arc<P>,
    pub(super) upstream: Arc<U>,
    pub(super) classes: Vec<RoleClassDefinition>,
    pub(super) cache: SnapshotCache,
    pub(super) provisioner: TagProvisioner,
    pub(super) notifier: Option<NotificationDispatcher>,
    pub(super) status: SyncStatusStore,
    identity: OnceCell<MemberId>,
}

impl<P, U> Controller<P, U>
where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    pub fn new(platform: Arc<P>, upstream: Arc<U>, classes: Vec<RoleClassDefinition>) -> Self {
        Controller {
            platform,
            upstream,
            classes,
            cache: SnapshotCache::new(DEFAULT_SNAPSHOT_TTL),
            provisioner: TagProvisioner::new(),
            notifier: None,
            status: SyncStatusStore::new(),
            identity: OnceCell::new(),
        }
    }

    pub fn with_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.cache = SnapshotCache::new(ttl);
        self
    }

    pub fn with_notifier(mut self, notifier: NotificationDispatcher) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn classes(&self) -> &[RoleClassDefinition] {
        &self.classes
    }

    pub fn status(&self) -> SyncStatusStore {
        self.status.clone()
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn provisioner(&self) -> &TagProvisioner {
        &self.provisioner
    }

    /// The identity the controller acts as, fetched once.
    ///
    /// `None` if the platform could not tell us; bots are still excluded in that
    /// case, and the lookup is retried on the next call.
    pub async fn identity(&self) -> Option<MemberId> {
        let result = self
            .identity
            .get_or_try_init(|| async {
                match self.platform.interpret(PlatformEffect::CurrentIdentity).await {
                    Ok(PlatformResponse::Identity(id)) => Ok(id),
                    Ok(_) => Err(SyncError::UnexpectedResponse("CurrentIdentity")),
                    Err(e) => Err(SyncError::Platform(e.to_string())),
                }
            })
            .await;
        match result {
            Ok(id) => Some(id.clone()),
            Err(e) => {
                warn!(error = %e, "Could not resolve own identity");
                None
            }
        }
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    /// The cached roster, fetched at most once per TTL.
    pub(super) async fn roster(&self) -> Result<Arc<Roster>, SyncError> {
        self.cache
            .roster(|| async {
                match self.platform.interpret(PlatformEffect::ListMembers).await {
                    Ok(PlatformResponse::Members(members)) => Ok(Roster::new(members)),
                    Ok(_) => Err(SyncError::UnexpectedResponse("ListMembers")),
                    Err(e) => Err(SyncError::Roster(e.to_string())),
                }
            })
            .await
    }

    pub(super) async fn eligibility(
        &self,
        endpoint: &str,
    ) -> Result<Arc<Vec<EligibilityRecord>>, SyncError> {
        self.cache
            .eligibility(endpoint, || self.fetch_records(endpoint, None))
            .await
    }

    pub(crate) async fn groups(&self) -> Result<Arc<Vec<DynamicGroup>>, SyncError> {
        self.cache
            .groups(|| async {
                match self.upstream.interpret(UpstreamEffect::FetchDynamicGroups).await {
                    Ok(UpstreamResponse::Groups(groups)) => Ok(groups),
                    Ok(_) => Err(SyncError::UnexpectedResponse("FetchDynamicGroups")),
                    Err(e) => Err(SyncError::Groups(e.to_string())),
                }
            })
            .await
    }

    /// Uncached fetch; with `member` set, only that member's records.
    pub(crate) async fn fetch_records(
        &self,
        endpoint: &str,
        member: Option<MemberId>,
    ) -> Result<Vec<EligibilityRecord>, SyncError> {
        let effect = UpstreamEffect::FetchEligibility {
            endpoint: endpoint.to_string(),
            member,
        };
        match self.upstream.interpret(effect).await {
            Ok(UpstreamResponse::Records(records)) => Ok(records),
            Ok(_) => Err(SyncError::UnexpectedResponse("FetchEligibility")),
            Err(e) => Err(SyncError::Eligibility {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Fetches one member directly from the platform; `None` if absent.
    pub(crate) async fn fetch_member(&self, member: &MemberId) -> Result<Option<Member>, SyncError> {
        let effect = PlatformEffect::GetMember {
            member: member.clone(),
        };
        match self.platform.interpret(effect).await {
            Ok(PlatformResponse::Member(member)) => Ok(member),
            Ok(_) => Err(SyncError::UnexpectedResponse("GetMember")),
            Err(e) => Err(SyncError::Platform(e.to_string())),
        }
    }

    // ─── Writes ───────────────────────────────────────────────────────────────

    /// Applies one tag change on the platform.
    pub(crate) async fn apply_change(
        &self,
        change: &TagChange,
        reason: &str,
    ) -> Result<(), SyncError> {
        let effect = match change {
            TagChange::Added { member, tag } => PlatformEffect::AddTag {
                member: member.clone(),
                tag: tag.clone(),
                reason: reason.to_string(),
            },
            TagChange::Removed { member, tag } => PlatformEffect::RemoveTag {
                member: member.clone(),
                tag: tag.clone(),
                reason: reason.to_string(),
            },
        };
        self.platform
            .interpret(effect)
            .await
            .map(|_| ())
            .map_err(|e| SyncError::Platform(e.to_string()))
    }

    pub(super) async fn write_booster_status(
        &self,
        member: &MemberId,
        is_booster: bool,
    ) -> Result<(), SyncError> {
        let effect = UpstreamEffect::WriteBoosterStatus {
            member: member.clone(),
            is_booster,
        };
        self.upstream
            .interpret(effect)
            .await
            .map(|_| ())
            .map_err(|e| SyncError::Upstream(e.to_string()))
    }

    /// Fires the class's celebration hook, if it has one and a notifier is set.
    pub(crate) fn celebrate(&self, class: &RoleClassDefinition, member: &Member) {
        if !class.notify {
            return;
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify(&class.name, &member.id, &member.display_name);
        }
    }
}

/// Audit-log reason attached to every mutation made for `class`.
pub fn audit_reason(class: &RoleClassDefinition) -> String {
    format!("role-sync: {}", class.name)
}
