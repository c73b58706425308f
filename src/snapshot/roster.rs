//! Guild roster snapshot.

use std::collections::BTreeMap;

use crate::types::{Member, MemberId, TagId};

/// A tag mutation that the platform acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagChange {
    Added { member: MemberId, tag: TagId },
    Removed { member: MemberId, tag: TagId },
}

/// All members of the managed guild at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: BTreeMap<MemberId, Member>,
}

impl Roster {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Roster {
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn get(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Applies acknowledged mutations. Changes for unknown members are ignored.
    pub fn apply(&mut self, changes: &[TagChange]) {
        for change in changes {
            match change {
                TagChange::Added { member, tag } => {
                    if let Some(m) = self.members.get_mut(member) {
                        m.tags.insert(tag.clone());
                    }
                }
                TagChange::Removed { member, tag } => {
                    if let Some(m) = self.members.get_mut(member) {
                        m.tags.remove(tag);
                    }
                }
            }
        }
    }

    /// Inserts or replaces one member.
    pub fn upsert(&mut self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_updates_known_members_only() {
        let mut roster = Roster::new([Member::new("a", "A").with_tags(["t1"])]);

        roster.apply(&[
            TagChange::Removed {
                member: MemberId::from("a"),
                tag: TagId::from("t1"),
            },
            TagChange::Added {
                member: MemberId::from("a"),
                tag: TagId::from("t2"),
            },
            TagChange::Added {
                member: MemberId::from("ghost"),
                tag: TagId::from("t2"),
            },
        ]);

        let a = roster.get(&MemberId::from("a")).unwrap();
        assert!(!a.has_tag(&TagId::from("t1")));
        assert!(a.has_tag(&TagId::from("t2")));
        assert!(!roster.contains(&MemberId::from("ghost")));
    }
}
