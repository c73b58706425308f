//! Platform members, upstream eligibility records and dynamic groups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{GroupKey, MemberId, TagId};

/// A member of the managed guild as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable platform identity.
    pub id: MemberId,

    /// Nickname if set, otherwise the global or user name.
    pub display_name: String,

    /// Platform bot accounts are never assigned or stripped of tags.
    #[serde(default)]
    pub is_bot: bool,

    /// Whether the member currently boosts the guild.
    #[serde(default)]
    pub is_booster: bool,

    /// Tags currently held within the guild.
    #[serde(default)]
    pub tags: BTreeSet<TagId>,
}

impl Member {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Member {
            id: MemberId::new(id),
            display_name: display_name.into(),
            is_bot: false,
            is_booster: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TagId>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn booster(mut self) -> Self {
        self.is_booster = true;
        self
    }

    pub fn has_tag(&self, tag: &TagId) -> bool {
        self.tags.contains(tag)
    }
}

/// One upstream account row.
///
/// Every attribute other than the member link is optional on the wire because each
/// eligibility endpoint only returns the fields relevant to its class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRecord {
    /// The linked platform member, if the account has been linked.
    #[serde(default)]
    pub external_member_id: Option<MemberId>,

    /// Upstream account identifier.
    #[serde(default)]
    pub account_id: Option<String>,

    /// Kingdom numbers linked to this account.
    #[serde(default)]
    pub kingdoms: Vec<u32>,

    #[serde(default)]
    pub referral_tier: Option<u32>,

    #[serde(default)]
    pub subscription_active: bool,

    #[serde(default)]
    pub fund_tier: Option<String>,

    /// Booster flag as last written back by the controller.
    #[serde(default)]
    pub is_booster: bool,
}

impl EligibilityRecord {
    pub fn linked(member: impl Into<String>) -> Self {
        EligibilityRecord {
            external_member_id: Some(MemberId::new(member)),
            ..Default::default()
        }
    }
}

/// An active numeric-range group served by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicGroup {
    pub min: u32,
    pub max: u32,
    pub label: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl DynamicGroup {
    pub fn new(min: u32, max: u32, label: impl Into<String>) -> Self {
        DynamicGroup {
            min,
            max,
            label: label.into(),
            active: true,
        }
    }

    pub fn key(&self) -> GroupKey {
        GroupKey::range(self.min, self.max)
    }

    /// Inclusive on both ends.
    pub fn contains(&self, n: u32) -> bool {
        self.min <= n && n <= self.max
    }
}
