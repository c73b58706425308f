//! Chat platform effect types.
//!
//! These types describe guild API operations as data, without executing them.
//! Effects are guild-scoped: the interpreter is constructed for one guild, so the
//! effects don't carry it.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, Member, MemberId, TagId};

/// A chat platform API effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// List every member of the guild.
    ListMembers,

    /// Fetch one member of the guild.
    GetMember { member: MemberId },

    /// List the guild's tags.
    ListTags,

    /// The identity the controller acts as.
    CurrentIdentity,

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Add a tag to a member. `reason` lands in the platform's audit log.
    AddTag {
        member: MemberId,
        tag: TagId,
        reason: String,
    },

    /// Remove a tag from a member.
    RemoveTag {
        member: MemberId,
        tag: TagId,
        reason: String,
    },

    /// Create a new tag with the given name.
    CreateTag { name: String },

    /// Post a message to a channel.
    PostMessage { channel: ChannelId, content: String },
}

impl PlatformEffect {
    /// Returns true if the effect changes platform state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            PlatformEffect::AddTag { .. }
                | PlatformEffect::RemoveTag { .. }
                | PlatformEffect::CreateTag { .. }
                | PlatformEffect::PostMessage { .. }
        )
    }
}

/// Tag data returned from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    pub id: TagId,
    pub name: String,
}

/// Response from executing a platform effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PlatformResponse {
    /// Response to `ListMembers`.
    Members(Vec<Member>),

    /// Response to `GetMember`; `None` if the member has left.
    Member(Option<Member>),

    /// Response to `ListTags`.
    Tags(Vec<TagData>),

    /// Response to `CreateTag`.
    Tag(TagData),

    /// Response to `CurrentIdentity`.
    Identity(MemberId),

    /// Mutation acknowledged.
    Ok,
}
