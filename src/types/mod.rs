//! Core domain types for the role sync controller.

pub mod class;
pub mod ids;
pub mod member;

// Re-export commonly used types at the module level
pub use class::{EligibilityRule, RemovalPolicy, RoleClassDefinition, TagStrategy};
pub use ids::{ChannelId, GroupKey, GuildId, MemberId, TagId};
pub use member::{DynamicGroup, EligibilityRecord, Member};
