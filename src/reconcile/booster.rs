//! Booster write-back.
//!
//! The upstream keeps its own copy of each linked member's booster flag. After the
//! booster class runs, every linked record whose flag disagrees with the platform
//! is corrected. Members who left the guild count as not boosting.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::effects::{PlatformInterpreter, UpstreamInterpreter};
use crate::snapshot::Roster;
use crate::types::{EligibilityRecord, MemberId};

use super::controller::Controller;
use super::result::SyncCycleResult;

/// Linked members whose recorded flag differs from the platform, with the
/// value to write.
pub fn booster_corrections(records: &[EligibilityRecord], roster: &Roster) -> Vec<(MemberId, bool)> {
    // Last record wins when an account is linked twice.
    let mut recorded = BTreeMap::new();
    for record in records {
        if let Some(member) = &record.external_member_id {
            recorded.insert(member.clone(), record.is_booster);
        }
    }

    recorded
        .into_iter()
        .filter_map(|(member, was_booster)| {
            let is_booster = roster.get(&member).is_some_and(|m| m.is_booster);
            (is_booster != was_booster).then_some((member, is_booster))
        })
        .collect()
}

impl<P, U> Controller<P, U>
where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    pub(super) async fn write_back_boosters(
        &self,
        records: &[EligibilityRecord],
        roster: &Roster,
        result: &mut SyncCycleResult,
    ) {
        for (member, is_booster) in booster_corrections(records, roster) {
            match self.write_booster_status(&member, is_booster).await {
                Ok(()) => {
                    debug!(member = %member, is_booster, "Booster status written back");
                    result.written_back += 1;
                }
                Err(e) => {
                    result.errors += 1;
                    warn!(member = %member, error = %e, "Booster write-back failed");
                }
            }
        }
    }
}
