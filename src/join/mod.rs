//! Join-time fast path.
//!
//! When a member joins, their tags are brought up to date immediately instead of
//! waiting for the next cycle. The fast path only ever adds tags, so it is safe
//! to run while a scheduled cycle is in flight.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::effects::{PlatformInterpreter, UpstreamInterpreter};
use crate::reconcile::plan::is_excluded;
use crate::reconcile::{Controller, SyncError, audit_reason, desired_targets};
use crate::snapshot::{Roster, TagChange};
use crate::types::{MemberId, TagStrategy};

/// Capacity of the member-joined event channel.
pub const JOIN_CHANNEL_CAPACITY: usize = 256;

impl<P, U> Controller<P, U>
where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    /// Assigns every tag a newly joined member is entitled to.
    ///
    /// Returns the number of tags added. Classes whose rule reads live platform
    /// state are left to the scheduled cycle.
    #[instrument(skip(self), fields(member = %member_id))]
    pub async fn handle_member_joined(&self, member_id: &MemberId) -> Result<usize, SyncError> {
        let Some(mut member) = self.fetch_member(member_id).await? else {
            debug!("Member already gone");
            return Ok(0);
        };
        let identity = self.identity().await;
        if is_excluded(&member, identity.as_ref()) {
            return Ok(0);
        }

        let roster = Roster::new([member.clone()]);
        let mut assigned = 0;

        for class in self.classes().iter().filter(|c| !c.rule.reads_platform_state()) {
            let mut records = match self
                .fetch_records(&class.endpoint, Some(member_id.clone()))
                .await
            {
                Ok(records) => records,
                Err(e) => {
                    warn!(class = %class.name, error = %e, "Eligibility fetch failed");
                    continue;
                }
            };
            records.retain(|r| r.external_member_id.as_ref() == Some(member_id));
            if records.is_empty() {
                continue;
            }

            let groups = match class.tag {
                TagStrategy::Static(_) => Vec::new(),
                TagStrategy::Dynamic => match self.groups().await {
                    Ok(groups) => groups.as_ref().clone(),
                    Err(e) => {
                        warn!(class = %class.name, error = %e, "Group fetch failed");
                        continue;
                    }
                },
            };

            let desired = desired_targets(class, &records, &roster, &groups);
            let reason = audit_reason(class);

            for tag in self.resolve_tags(class, &desired, &groups).await {
                if member.has_tag(&tag) {
                    continue;
                }
                let change = TagChange::Added {
                    member: member_id.clone(),
                    tag: tag.clone(),
                };
                match self.apply_change(&change, &reason).await {
                    Ok(()) => {
                        debug!(class = %class.name, tag = %tag, "Assigned on join");
                        member.tags.insert(tag);
                        assigned += 1;
                        self.celebrate(class, &member);
                    }
                    Err(e) => warn!(class = %class.name, tag = %tag, error = %e, "Assign on join failed"),
                }
            }
        }

        if assigned > 0 {
            info!(assigned, "Fast path assigned tags");
        }
        self.cache().upsert_member(member).await;
        Ok(assigned)
    }
}

/// Spawns the task that runs the fast path for each member-joined event.
///
/// Events are handled one at a time in arrival order.
pub fn spawn_join_worker<P, U>(
    controller: Arc<Controller<P, U>>,
    mut rx: mpsc::Receiver<MemberId>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    tokio::spawn(async move {
        loop {
            let member = tokio::select! {
                _ = shutdown.cancelled() => break,
                member = rx.recv() => match member {
                    Some(member) => member,
                    None => break,
                },
            };
            if let Err(e) = controller.handle_member_joined(&member).await {
                warn!(member = %member, error = %e, "Join fast path failed");
            }
        }
        info!("Join worker stopped");
    })
}
