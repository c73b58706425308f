//! Upstream profile service effect types.

use serde::{Deserialize, Serialize};

use crate::types::{DynamicGroup, EligibilityRecord, MemberId};

/// An upstream profile service effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamEffect {
    /// Fetch the eligibility records served at `/api/sync/{endpoint}`.
    ///
    /// With `member` set, only that member's records are requested (join-time
    /// fast path).
    FetchEligibility {
        endpoint: String,
        member: Option<MemberId>,
    },

    /// Fetch the range groups used by dynamically provisioned tags.
    FetchDynamicGroups,

    /// Record whether a linked member currently boosts the guild.
    WriteBoosterStatus { member: MemberId, is_booster: bool },
}

/// Response from executing an upstream effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum UpstreamResponse {
    Records(Vec<EligibilityRecord>),
    Groups(Vec<DynamicGroup>),
    Ok,
}
