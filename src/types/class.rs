//! Role class definitions: the configuration unit of the reconciler.
//!
//! A class names one eligibility category, the rule that decides who belongs to it,
//! how its tag(s) are resolved, and whether stale holders may be stripped.
//! Definitions are loaded once at startup and never change during a cycle.

use serde::{Deserialize, Serialize};

use super::ids::TagId;

/// Default lower bound of eligible records below which removals are suspended.
pub const DEFAULT_MIN_ELIGIBLE_RECORDS: usize = 1;

/// The eligibility predicate of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityRule {
    /// Any account linked to a platform member.
    LinkedAccount,

    /// Referral tier at or above `min_tier`.
    ReferralTier { min_tier: u32 },

    /// Active paid subscription.
    Subscriber,

    /// Fund contribution tier equal to `tier` (case-insensitive).
    FundTier { tier: String },

    /// One dynamic tag per active range group containing any linked kingdom.
    KingdomRange,

    /// Linked account whose member currently boosts the guild.
    Booster,
}

impl EligibilityRule {
    /// Returns true if the rule depends on live platform state rather than only
    /// on upstream data.
    pub fn reads_platform_state(&self) -> bool {
        matches!(self, EligibilityRule::Booster)
    }
}

/// How the class's tag identifiers are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStrategy {
    /// A single pre-existing tag.
    Static(TagId),

    /// Tags provisioned on demand, keyed by group.
    Dynamic,
}

/// Whether the reconciler strips the class's tags from members who lost eligibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Never remove.
    Disabled,

    /// Remove, unless the eligible set looks anomalously empty.
    #[default]
    Guarded,

    /// Remove unconditionally.
    Unguarded,
}

impl RemovalPolicy {
    pub fn removes(&self) -> bool {
        !matches!(self, RemovalPolicy::Disabled)
    }

    pub fn is_guarded(&self) -> bool {
        matches!(self, RemovalPolicy::Guarded)
    }
}

/// One eligibility class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClassDefinition {
    /// Unique class name, used in logs, diagnostics and notification dedup.
    pub name: String,

    /// Upstream endpoint under `/api/sync/` serving this class's records.
    pub endpoint: String,

    pub rule: EligibilityRule,

    pub tag: TagStrategy,

    #[serde(default)]
    pub removal: RemovalPolicy,

    /// The safety guard trips when fewer eligible records than this are returned
    /// while members still hold a managed tag.
    #[serde(default = "default_min_eligible_records")]
    pub min_eligible_records: usize,

    /// Post a celebratory notification on new grants.
    #[serde(default)]
    pub notify: bool,
}

fn default_min_eligible_records() -> usize {
    DEFAULT_MIN_ELIGIBLE_RECORDS
}

impl RoleClassDefinition {
    /// Creates a guarded, non-notifying class with a static tag.
    pub fn with_static_tag(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        rule: EligibilityRule,
        tag: impl Into<TagId>,
    ) -> Self {
        RoleClassDefinition {
            name: name.into(),
            endpoint: endpoint.into(),
            rule,
            tag: TagStrategy::Static(tag.into()),
            removal: RemovalPolicy::default(),
            min_eligible_records: DEFAULT_MIN_ELIGIBLE_RECORDS,
            notify: false,
        }
    }

    /// Creates a guarded, non-notifying class with dynamically provisioned tags.
    pub fn with_dynamic_tags(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        rule: EligibilityRule,
    ) -> Self {
        RoleClassDefinition {
            name: name.into(),
            endpoint: endpoint.into(),
            rule,
            tag: TagStrategy::Dynamic,
            removal: RemovalPolicy::default(),
            min_eligible_records: DEFAULT_MIN_ELIGIBLE_RECORDS,
            notify: false,
        }
    }

    pub fn removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    pub fn notifying(mut self) -> Self {
        self.notify = true;
        self
    }

    /// Returns the static tag, if the class uses one.
    pub fn static_tag(&self) -> Option<&TagId> {
        match &self.tag {
            TagStrategy::Static(tag) => Some(tag),
            TagStrategy::Dynamic => None,
        }
    }
}
