//! Shared test utilities: in-memory interpreters and arbitrary generators.
//!
//! `MockPlatform` keeps a guild roster and applies tag mutations to it, so a test
//! can run a cycle and then inspect both the issued effects and the resulting
//! holder sets. `MockUpstream` serves canned eligibility records per endpoint.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use proptest::prelude::*;
use thiserror::Error;

use crate::effects::{
    PlatformEffect, PlatformInterpreter, PlatformResponse, TagData, UpstreamEffect,
    UpstreamInterpreter, UpstreamResponse,
};
use crate::types::{DynamicGroup, EligibilityRecord, Member, MemberId, TagId};

/// Error returned by the mock interpreters.
#[derive(Debug, Clone, Error)]
#[error("mock: {0}")]
pub struct MockError(pub String);

// ─── Platform ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PlatformState {
    members: BTreeMap<MemberId, Member>,
    tags: Vec<TagData>,
    next_tag_id: u64,
    effects: Vec<PlatformEffect>,
    fail_list_members: bool,
    fail_create_tag: bool,
    fail_post_message: bool,
    fail_mutations_for: HashSet<MemberId>,
}

/// In-memory guild.
#[derive(Debug)]
pub struct MockPlatform {
    identity: MemberId,
    state: Mutex<PlatformState>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        MockPlatform {
            identity: MemberId::from("bot-self"),
            state: Mutex::new(PlatformState {
                next_tag_id: 9000,
                ..Default::default()
            }),
        }
    }

    pub fn with_member(self, member: Member) -> Self {
        self.add_member(member);
        self
    }

    pub fn with_tag(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().tags.push(TagData {
            id: TagId::from(id),
            name: name.to_string(),
        });
        self
    }

    pub fn identity(&self) -> &MemberId {
        &self.identity
    }

    pub fn add_member(&self, member: Member) {
        self.state
            .lock()
            .unwrap()
            .members
            .insert(member.id.clone(), member);
    }

    pub fn remove_member(&self, id: &str) {
        self.state.lock().unwrap().members.remove(&MemberId::from(id));
    }

    pub fn member(&self, id: &str) -> Option<Member> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(&MemberId::from(id))
            .cloned()
    }

    /// Members currently holding `tag`.
    pub fn holders(&self, tag: &str) -> BTreeSet<MemberId> {
        let tag = TagId::from(tag);
        self.state
            .lock()
            .unwrap()
            .members
            .values()
            .filter(|m| m.has_tag(&tag))
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn tags(&self) -> Vec<TagData> {
        self.state.lock().unwrap().tags.clone()
    }

    /// Every effect interpreted so far, in order.
    pub fn effects(&self) -> Vec<PlatformEffect> {
        self.state.lock().unwrap().effects.clone()
    }

    /// Only the effects that changed state.
    pub fn mutations(&self) -> Vec<PlatformEffect> {
        self.effects()
            .into_iter()
            .filter(PlatformEffect::is_mutation)
            .collect()
    }

    pub fn count_effects(&self, pred: impl Fn(&PlatformEffect) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .effects
            .iter()
            .filter(|e| pred(e))
            .count()
    }

    /// Messages posted to any channel.
    pub fn posted_messages(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                PlatformEffect::PostMessage { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn clear_effects(&self) {
        self.state.lock().unwrap().effects.clear();
    }

    pub fn set_fail_list_members(&self, fail: bool) {
        self.state.lock().unwrap().fail_list_members = fail;
    }

    pub fn set_fail_create_tag(&self, fail: bool) {
        self.state.lock().unwrap().fail_create_tag = fail;
    }

    pub fn set_fail_post_message(&self, fail: bool) {
        self.state.lock().unwrap().fail_post_message = fail;
    }

    /// Makes every tag mutation targeting `member` fail.
    pub fn fail_mutations_for(&self, member: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_mutations_for
            .insert(MemberId::from(member));
    }
}

impl PlatformInterpreter for MockPlatform {
    type Error = MockError;

    async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, MockError> {
        let mut state = self.state.lock().unwrap();
        state.effects.push(effect.clone());

        match effect {
            PlatformEffect::ListMembers => {
                if state.fail_list_members {
                    return Err(MockError("member list unavailable".into()));
                }
                Ok(PlatformResponse::Members(
                    state.members.values().cloned().collect(),
                ))
            }
            PlatformEffect::GetMember { member } => {
                Ok(PlatformResponse::Member(state.members.get(&member).cloned()))
            }
            PlatformEffect::ListTags => Ok(PlatformResponse::Tags(state.tags.clone())),
            PlatformEffect::CurrentIdentity => Ok(PlatformResponse::Identity(self.identity.clone())),
            PlatformEffect::AddTag { member, tag, .. } => {
                if state.fail_mutations_for.contains(&member) {
                    return Err(MockError(format!("missing permissions for {}", member)));
                }
                let m = state
                    .members
                    .get_mut(&member)
                    .ok_or_else(|| MockError(format!("unknown member {}", member)))?;
                m.tags.insert(tag);
                Ok(PlatformResponse::Ok)
            }
            PlatformEffect::RemoveTag { member, tag, .. } => {
                if state.fail_mutations_for.contains(&member) {
                    return Err(MockError(format!("missing permissions for {}", member)));
                }
                let m = state
                    .members
                    .get_mut(&member)
                    .ok_or_else(|| MockError(format!("unknown member {}", member)))?;
                m.tags.remove(&tag);
                Ok(PlatformResponse::Ok)
            }
            PlatformEffect::CreateTag { name } => {
                if state.fail_create_tag {
                    return Err(MockError("tag limit reached".into()));
                }
                state.next_tag_id += 1;
                let tag = TagData {
                    id: TagId::new(state.next_tag_id.to_string()),
                    name,
                };
                state.tags.push(tag.clone());
                Ok(PlatformResponse::Tag(tag))
            }
            PlatformEffect::PostMessage { .. } => {
                if state.fail_post_message {
                    return Err(MockError("channel unavailable".into()));
                }
                Ok(PlatformResponse::Ok)
            }
        }
    }
}

// ─── Upstream ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UpstreamState {
    records: HashMap<String, Vec<EligibilityRecord>>,
    groups: Vec<DynamicGroup>,
    failing: HashSet<String>,
    fail_groups: bool,
    effects: Vec<UpstreamEffect>,
}

/// In-memory profile service.
#[derive(Debug, Default)]
pub struct MockUpstream {
    state: Mutex<UpstreamState>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, endpoint: &str, records: Vec<EligibilityRecord>) -> Self {
        self.set_records(endpoint, records);
        self
    }

    pub fn with_groups(self, groups: Vec<DynamicGroup>) -> Self {
        self.state.lock().unwrap().groups = groups;
        self
    }

    pub fn set_records(&self, endpoint: &str, records: Vec<EligibilityRecord>) {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(endpoint.to_string(), records);
    }

    /// Makes fetches of `endpoint` fail until cleared.
    pub fn set_failing(&self, endpoint: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing.insert(endpoint.to_string());
        } else {
            state.failing.remove(endpoint);
        }
    }

    pub fn set_fail_groups(&self, fail: bool) {
        self.state.lock().unwrap().fail_groups = fail;
    }

    pub fn effects(&self) -> Vec<UpstreamEffect> {
        self.state.lock().unwrap().effects.clone()
    }

    /// Number of full (unfiltered) fetches of `endpoint`.
    pub fn full_fetches(&self, endpoint: &str) -> usize {
        self.effects()
            .iter()
            .filter(|e| {
                matches!(e, UpstreamEffect::FetchEligibility { endpoint: ep, member: None } if ep == endpoint)
            })
            .count()
    }

    /// Booster write-backs in order.
    pub fn booster_writes(&self) -> Vec<(MemberId, bool)> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                UpstreamEffect::WriteBoosterStatus { member, is_booster } => {
                    Some((member, is_booster))
                }
                _ => None,
            })
            .collect()
    }
}

impl UpstreamInterpreter for MockUpstream {
    type Error = MockError;

    async fn interpret(&self, effect: UpstreamEffect) -> Result<UpstreamResponse, MockError> {
        let mut state = self.state.lock().unwrap();
        state.effects.push(effect.clone());

        match effect {
            UpstreamEffect::FetchEligibility { endpoint, member } => {
                if state.failing.contains(&endpoint) {
                    return Err(MockError(format!("timeout fetching {}", endpoint)));
                }
                let records = state.records.get(&endpoint).cloned().unwrap_or_default();
                let records = match member {
                    Some(member) => records
                        .into_iter()
                        .filter(|r| r.external_member_id.as_ref() == Some(&member))
                        .collect(),
                    None => records,
                };
                Ok(UpstreamResponse::Records(records))
            }
            UpstreamEffect::FetchDynamicGroups => {
                if state.fail_groups {
                    return Err(MockError("groups unavailable".into()));
                }
                Ok(UpstreamResponse::Groups(state.groups.clone()))
            }
            UpstreamEffect::WriteBoosterStatus { .. } => Ok(UpstreamResponse::Ok),
        }
    }
}

// ─── Generators ───────────────────────────────────────────────────────────────

/// Member IDs drawn from a small pool so that sets overlap.
pub fn arb_member_id() -> impl Strategy<Value = String> {
    (0u8..12).prop_map(|n| format!("m{}", n))
}

pub fn arb_member_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(arb_member_id(), 0..12)
}
