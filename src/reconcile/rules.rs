//! Eligibility rules: which tag targets each upstream record entitles its member to.

use std::collections::{BTreeMap, BTreeSet};

use crate::snapshot::Roster;
use crate::types::{
    DynamicGroup, EligibilityRecord, EligibilityRule, GroupKey, MemberId, RoleClassDefinition,
};

/// A tag target within one class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    /// The class's single static tag.
    Static,
    /// The dynamically provisioned tag of one range group.
    Group(GroupKey),
}

/// Desired holders of a class, keyed by target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Desired {
    pub by_target: BTreeMap<Target, BTreeSet<MemberId>>,
    /// Linked members with at least one target.
    pub eligible: BTreeSet<MemberId>,
}

impl Desired {
    pub fn members_for(&self, target: &Target) -> Option<&BTreeSet<MemberId>> {
        self.by_target.get(target)
    }
}

/// Targets `record` yields under `rule`. Unlinked records yield nothing.
pub fn record_targets(
    rule: &EligibilityRule,
    record: &EligibilityRecord,
    roster: &Roster,
    groups: &[DynamicGroup],
) -> Vec<Target> {
    let Some(member) = &record.external_member_id else {
        return Vec::new();
    };

    let accepted = match rule {
        EligibilityRule::LinkedAccount => true,
        EligibilityRule::ReferralTier { min_tier } => {
            record.referral_tier.is_some_and(|tier| tier >= *min_tier)
        }
        EligibilityRule::Subscriber => record.subscription_active,
        EligibilityRule::FundTier { tier } => record
            .fund_tier
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(tier.trim())),
        EligibilityRule::Booster => roster.get(member).is_some_and(|m| m.is_booster),
        EligibilityRule::KingdomRange => {
            return groups
                .iter()
                .filter(|g| g.active && record.kingdoms.iter().any(|k| g.contains(*k)))
                .map(|g| Target::Group(g.key()))
                .collect();
        }
    };

    if accepted {
        vec![Target::Static]
    } else {
        Vec::new()
    }
}

/// Folds every record of a class into its desired holder sets.
///
/// Several records may link the same member; their targets are merged.
pub fn desired_targets(
    class: &RoleClassDefinition,
    records: &[EligibilityRecord],
    roster: &Roster,
    groups: &[DynamicGroup],
) -> Desired {
    let mut desired = Desired::default();
    for record in records {
        let Some(member) = &record.external_member_id else {
            continue;
        };
        for target in record_targets(&class.rule, record, roster, groups) {
            desired.eligible.insert(member.clone());
            desired
                .by_target
                .entry(target)
                .or_default()
                .insert(member.clone());
        }
    }
    desired
}
