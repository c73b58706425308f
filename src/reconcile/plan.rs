//! Pure diff of desired holders against the roster.
//!
//! Planning performs no I/O: given the resolved managed tags of one class and the
//! current roster it decides which tags to add and which to strip, and whether the
//! mass-removal guard suspends the strips.

use std::collections::BTreeSet;

use crate::snapshot::{Roster, TagChange};
use crate::types::{Member, MemberId, RoleClassDefinition, TagId};

/// One platform tag managed by a class, with the members who should hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedTag {
    pub tag: TagId,
    pub desired: BTreeSet<MemberId>,
}

/// The mutations one class needs, plus the counters that describe them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPlan {
    pub assign: Vec<TagChange>,
    pub remove: Vec<TagChange>,
    pub already_has: usize,
    pub in_guild: usize,
    pub not_in_guild: usize,
    pub guard_tripped: bool,
}

/// Bots and the controller itself are never touched.
pub fn is_excluded(member: &Member, identity: Option<&MemberId>) -> bool {
    member.is_bot || identity.is_some_and(|id| *id == member.id)
}

/// Computes the mutations that bring `roster` in line with `managed`.
///
/// # Arguments
///
/// * `eligible` - Linked members the class's rule accepted
/// * `linked_records` - Linked records the upstream endpoint returned. The
///   mass-removal guard compares this against `min_eligible_records`, so a
///   normal answer in which nobody qualifies still strips stale holders.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use role_sync::reconcile::{ManagedTag, plan_class};
/// use role_sync::snapshot::{Roster, TagChange};
/// use role_sync::types::{EligibilityRule, Member, MemberId, RoleClassDefinition};
///
/// let class = RoleClassDefinition::with_static_tag(
///     "subscriber",
///     "subscriptions",
///     EligibilityRule::Subscriber,
///     "t",
/// );
/// let roster = Roster::new([
///     Member::new("a", "A"),
///     Member::new("b", "B").with_tags(["t"]),
/// ]);
/// let eligible: BTreeSet<MemberId> = [MemberId::from("a")].into();
/// let managed = [ManagedTag { tag: "t".into(), desired: eligible.clone() }];
///
/// let plan = plan_class(&class, &managed, &eligible, 1, &roster, None);
///
/// assert_eq!(plan.assign, vec![TagChange::Added { member: "a".into(), tag: "t".into() }]);
/// assert_eq!(plan.remove, vec![TagChange::Removed { member: "b".into(), tag: "t".into() }]);
/// ```
pub fn plan_class(
    class: &RoleClassDefinition,
    managed: &[ManagedTag],
    eligible: &BTreeSet<MemberId>,
    linked_records: usize,
    roster: &Roster,
    identity: Option<&MemberId>,
) -> ClassPlan {
    let mut plan = ClassPlan::default();

    for member in eligible {
        if roster.contains(member) {
            plan.in_guild += 1;
        } else {
            plan.not_in_guild += 1;
        }
    }

    let mut any_holder = false;
    let mut stale = Vec::new();

    for managed_tag in managed {
        for id in &managed_tag.desired {
            let Some(member) = roster.get(id) else {
                continue;
            };
            if is_excluded(member, identity) {
                continue;
            }
            if member.has_tag(&managed_tag.tag) {
                plan.already_has += 1;
            } else {
                plan.assign.push(TagChange::Added {
                    member: id.clone(),
                    tag: managed_tag.tag.clone(),
                });
            }
        }

        for member in roster.members() {
            if !member.has_tag(&managed_tag.tag) || is_excluded(member, identity) {
                continue;
            }
            any_holder = true;
            if !managed_tag.desired.contains(&member.id) {
                stale.push(TagChange::Removed {
                    member: member.id.clone(),
                    tag: managed_tag.tag.clone(),
                });
            }
        }
    }

    if !class.removal.removes() {
        return plan;
    }

    if class.removal.is_guarded() && linked_records < class.min_eligible_records && any_holder {
        plan.guard_tripped = true;
        return plan;
    }

    plan.remove = stale;
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EligibilityRule, RemovalPolicy};

    fn class() -> RoleClassDefinition {
        RoleClassDefinition::with_static_tag(
            "subscriber",
            "subscriptions",
            EligibilityRule::Subscriber,
            "t",
        )
    }

    fn ids(items: &[&str]) -> BTreeSet<MemberId> {
        items.iter().map(|s| MemberId::from(*s)).collect()
    }

    fn managed(desired: &[&str]) -> Vec<ManagedTag> {
        vec![ManagedTag {
            tag: TagId::from("t"),
            desired: ids(desired),
        }]
    }

    #[test]
    fn diff_assigns_missing_and_removes_stale() {
        // Eligible {A,B,C}, guild {A,B,D}, holders {B,D}.
        let roster = Roster::new([
            Member::new("A", "a"),
            Member::new("B", "b").with_tags(["t"]),
            Member::new("D", "d").with_tags(["t"]),
        ]);

        let plan = plan_class(
            &class(),
            &managed(&["A", "B", "C"]),
            &ids(&["A", "B", "C"]),
            3,
            &roster,
            None,
        );

        assert_eq!(
            plan.assign,
            vec![TagChange::Added {
                member: "A".into(),
                tag: "t".into()
            }]
        );
        assert_eq!(
            plan.remove,
            vec![TagChange::Removed {
                member: "D".into(),
                tag: "t".into()
            }]
        );
        assert_eq!(plan.already_has, 1);
        assert_eq!(plan.in_guild, 2);
        assert_eq!(plan.not_in_guild, 1);
        assert!(!plan.guard_tripped);
    }

    #[test]
    fn bots_and_self_are_never_touched() {
        let roster = Roster::new([
            Member::new("bot", "b").bot(),
            Member::new("me", "m").with_tags(["t"]),
            Member::new("other-bot", "o").bot().with_tags(["t"]),
        ]);
        let me = MemberId::from("me");

        let plan = plan_class(
            &class(),
            &managed(&["bot"]),
            &ids(&["bot"]),
            1,
            &roster,
            Some(&me),
        );

        assert!(plan.assign.is_empty());
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn guard_trips_on_empty_eligible_set_with_holders() {
        let roster = Roster::new(
            (0..50).map(|i| Member::new(format!("m{}", i), "x").with_tags(["t"])),
        );

        let plan = plan_class(&class(), &managed(&[]), &BTreeSet::new(), 0, &roster, None);

        assert!(plan.guard_tripped);
        assert!(plan.remove.is_empty());
        assert!(plan.assign.is_empty());
    }

    #[test]
    fn guard_does_not_trip_without_holders() {
        let roster = Roster::new([Member::new("a", "A")]);
        let plan = plan_class(&class(), &managed(&[]), &BTreeSet::new(), 0, &roster, None);
        assert!(!plan.guard_tripped);
    }

    #[test]
    fn unguarded_class_removes_even_when_empty() {
        let roster = Roster::new([Member::new("a", "A").with_tags(["t"])]);
        let class = class().removal(RemovalPolicy::Unguarded);

        let plan = plan_class(&class, &managed(&[]), &BTreeSet::new(), 0, &roster, None);

        assert!(!plan.guard_tripped);
        assert_eq!(plan.remove.len(), 1);
    }

    #[test]
    fn disabled_removal_never_removes() {
        let roster = Roster::new([Member::new("a", "A").with_tags(["t"])]);
        let class = class().removal(RemovalPolicy::Disabled);

        let plan = plan_class(&class, &managed(&["b"]), &ids(&["b"]), 1, &roster, None);

        assert!(plan.remove.is_empty());
        assert!(!plan.guard_tripped);
    }

    #[test]
    fn raised_threshold_trips_guard_on_small_sets() {
        let roster = Roster::new([
            Member::new("a", "A").with_tags(["t"]),
            Member::new("b", "B").with_tags(["t"]),
        ]);
        let mut class = class();
        class.min_eligible_records = 2;

        let plan = plan_class(&class, &managed(&["a"]), &ids(&["a"]), 1, &roster, None);

        assert!(plan.guard_tripped);
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn guard_counts_returned_records_not_accepted_members() {
        // The endpoint answered with linked records, none of which qualify.
        let roster = Roster::new([Member::new("a", "A").with_tags(["t"])]);

        let plan = plan_class(&class(), &managed(&[]), &BTreeSet::new(), 2, &roster, None);

        assert!(!plan.guard_tripped);
        assert_eq!(
            plan.remove,
            vec![TagChange::Removed {
                member: "a".into(),
                tag: "t".into()
            }]
        );
    }
}
