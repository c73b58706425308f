//! The reconciliation cycle.
//!
//! A cycle reads the roster once, then runs every class strictly in order. Each
//! class diffs its desired holders against the cycle's roster copy, applies the
//! mutations and feeds the acknowledged ones back into the copy (and the cache)
//! so later classes see them.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::effects::{PlatformInterpreter, UpstreamInterpreter};
use crate::provision::ProvisionError;
use crate::snapshot::{Roster, TagChange};
use crate::types::{DynamicGroup, GroupKey, MemberId, RoleClassDefinition, TagId, TagStrategy};

use super::controller::{Controller, audit_reason};
use super::plan::{ManagedTag, plan_class};
use super::result::SyncCycleResult;
use super::rules::{Desired, Target, desired_targets};

impl<P, U> Controller<P, U>
where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    /// Runs one full cycle over every class.
    ///
    /// Stops at the next class boundary once `cancel` fires; classes that did not
    /// run keep their previous status entry.
    #[instrument(skip_all)]
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Vec<SyncCycleResult> {
        self.status.begin_cycle().await;
        let identity = self.identity().await;

        let results = match self.roster().await {
            Err(e) => {
                warn!(error = %e, "Roster fetch failed, skipping cycle");
                self.classes
                    .iter()
                    .map(|class| SyncCycleResult::fetch_failed(&class.name, e.to_string()))
                    .collect()
            }
            Ok(shared) => {
                let mut roster = Roster::clone(&shared);
                drop(shared);
                debug!(members = roster.len(), "Roster loaded");

                let mut results = Vec::with_capacity(self.classes.len());
                for class in &self.classes {
                    if cancel.is_cancelled() {
                        info!("Shutdown requested, stopping cycle at class boundary");
                        break;
                    }
                    let (result, applied) =
                        self.reconcile_class(class, &roster, identity.as_ref()).await;
                    roster.apply(&applied);
                    self.cache.apply(&applied).await;
                    results.push(result);
                }
                results
            }
        };

        self.status.finish_cycle(&results).await;
        let (assigned, removed, errors) = results.iter().fold((0, 0, 0), |acc, r| {
            (acc.0 + r.assigned, acc.1 + r.removed, acc.2 + r.errors)
        });
        info!(classes = results.len(), assigned, removed, errors, "Sync cycle finished");
        results
    }

    /// Reconciles one class against `roster`.
    ///
    /// Returns the class's counters and the tag changes the platform acknowledged.
    #[instrument(skip_all, fields(class = %class.name))]
    pub(super) async fn reconcile_class(
        &self,
        class: &RoleClassDefinition,
        roster: &Roster,
        identity: Option<&MemberId>,
    ) -> (SyncCycleResult, Vec<TagChange>) {
        let mut result = SyncCycleResult::new(&class.name);

        let records = match self.eligibility(&class.endpoint).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Eligibility fetch failed, skipping class");
                result.fetch_error = Some(e.to_string());
                return (result.finish(), Vec::new());
            }
        };

        let groups = match class.tag {
            TagStrategy::Static(_) => Vec::new(),
            TagStrategy::Dynamic => match self.groups().await {
                Ok(groups) => groups.as_ref().clone(),
                Err(e) => {
                    warn!(error = %e, "Group fetch failed, skipping class");
                    result.fetch_error = Some(e.to_string());
                    return (result.finish(), Vec::new());
                }
            },
        };

        let desired = desired_targets(class, &records, roster, &groups);
        let managed = self
            .resolve_managed(class, &desired, &groups, &mut result)
            .await;
        let linked_records = records
            .iter()
            .filter(|r| r.external_member_id.is_some())
            .count();
        let plan = plan_class(
            class,
            &managed,
            &desired.eligible,
            linked_records,
            roster,
            identity,
        );

        result.eligible = desired.eligible.len();
        result.in_guild = plan.in_guild;
        result.not_in_guild = plan.not_in_guild;
        result.already_has = plan.already_has;
        result.guard_tripped = plan.guard_tripped;
        if plan.guard_tripped {
            warn!(
                linked_records,
                min_eligible = class.min_eligible_records,
                "Upstream returned too few records while tags are held, skipping removals"
            );
        }

        let reason = audit_reason(class);
        let mut applied = Vec::new();

        for change in plan.assign {
            match self.apply_change(&change, &reason).await {
                Ok(()) => {
                    result.assigned += 1;
                    if let TagChange::Added { member, tag } = &change {
                        debug!(member = %member, tag = %tag, "Assigned");
                        if let Some(m) = roster.get(member) {
                            self.celebrate(class, m);
                        }
                    }
                    applied.push(change);
                }
                Err(e) => {
                    result.errors += 1;
                    warn!(change = ?change, error = %e, "Assign failed");
                }
            }
        }

        for change in plan.remove {
            match self.apply_change(&change, &reason).await {
                Ok(()) => {
                    result.removed += 1;
                    debug!(change = ?change, "Removed");
                    applied.push(change);
                }
                Err(e) => {
                    result.errors += 1;
                    warn!(change = ?change, error = %e, "Remove failed");
                }
            }
        }

        if class.rule.reads_platform_state() {
            self.write_back_boosters(&records, roster, &mut result).await;
        }

        info!(
            assigned = result.assigned,
            removed = result.removed,
            already_has = result.already_has,
            errors = result.errors,
            eligible = result.eligible,
            not_in_guild = result.not_in_guild,
            "Class reconciled"
        );
        (result.finish(), applied)
    }

    /// Resolves the platform tags a class manages this cycle.
    ///
    /// Range groups with desired members are provisioned; groups without any are
    /// only looked up so stale holders can still be stripped. Groups that fail to
    /// resolve are dropped and counted as errors.
    async fn resolve_managed(
        &self,
        class: &RoleClassDefinition,
        desired: &Desired,
        groups: &[DynamicGroup],
        result: &mut SyncCycleResult,
    ) -> Vec<ManagedTag> {
        match &class.tag {
            TagStrategy::Static(tag) => vec![ManagedTag {
                tag: tag.clone(),
                desired: desired
                    .members_for(&Target::Static)
                    .cloned()
                    .unwrap_or_default(),
            }],
            TagStrategy::Dynamic => {
                let mut managed = Vec::new();
                for group in groups.iter().filter(|g| g.active) {
                    let key = group.key();
                    let members = desired
                        .members_for(&Target::Group(key.clone()))
                        .cloned()
                        .unwrap_or_default();
                    match self.group_tag(&key, &group.label, !members.is_empty()).await {
                        Ok(Some(tag)) => managed.push(ManagedTag {
                            tag,
                            desired: members,
                        }),
                        Ok(None) => {}
                        Err(e) => {
                            result.errors += 1;
                            warn!(group = %key, error = %e, "Tag provisioning failed, skipping group");
                        }
                    }
                }
                managed
            }
        }
    }

    async fn group_tag(
        &self,
        key: &GroupKey,
        label: &str,
        create: bool,
    ) -> Result<Option<TagId>, ProvisionError> {
        if create {
            self.provisioner
                .ensure_tag(self.platform.as_ref(), key, label)
                .await
                .map(Some)
        } else {
            self.provisioner
                .find_tag(self.platform.as_ref(), key, label)
                .await
        }
    }

    /// Resolves the targets in `desired` to tags, provisioning groups as needed.
    ///
    /// Used by the join-time fast path; provisioning failures are logged and the
    /// affected group skipped.
    pub(crate) async fn resolve_tags(
        &self,
        class: &RoleClassDefinition,
        desired: &Desired,
        groups: &[DynamicGroup],
    ) -> BTreeSet<TagId> {
        let mut tags = BTreeSet::new();
        for target in desired.by_target.keys() {
            match (target, &class.tag) {
                (Target::Static, TagStrategy::Static(tag)) => {
                    tags.insert(tag.clone());
                }
                (Target::Group(key), TagStrategy::Dynamic) => {
                    let label = groups
                        .iter()
                        .find(|g| g.key() == *key)
                        .map(|g| g.label.as_str())
                        .unwrap_or_default();
                    match self
                        .provisioner
                        .ensure_tag(self.platform.as_ref(), key, label)
                        .await
                    {
                        Ok(tag) => {
                            tags.insert(tag);
                        }
                        Err(e) => warn!(group = %key, error = %e, "Tag provisioning failed"),
                    }
                }
                _ => {}
            }
        }
        tags
    }
}
