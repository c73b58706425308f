//! Dynamic tag provisioning.
//!
//! Range groups are served by the upstream and have no pre-existing platform tag.
//! The provisioner maps each group key to a tag ID, reusing a tag with the derived
//! name if one exists and creating it otherwise. Mappings live for the process
//! lifetime.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::effects::{PlatformEffect, PlatformInterpreter, PlatformResponse, TagData};
use crate::types::{GroupKey, TagId};

/// Failure to resolve a group key to a tag.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("listing tags failed: {0}")]
    List(String),

    #[error("creating tag {name:?} failed: {message}")]
    Create { name: String, message: String },

    #[error("unexpected platform response to {0}")]
    UnexpectedResponse(&'static str),
}

/// The tag name used for a group: the trimmed label, or the key if the label is blank.
pub fn derived_tag_name(key: &GroupKey, label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        key.as_str().to_string()
    } else {
        label.to_string()
    }
}

/// Group key to tag ID resolver with a process-lifetime cache.
#[derive(Debug, Default)]
pub struct TagProvisioner {
    // Held across lookup and creation so concurrent callers for one key never
    // both create.
    cache: Mutex<HashMap<GroupKey, TagId>>,
}

impl TagProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached tag for `key` without touching the platform.
    #[cfg(test)]
    pub(crate) async fn cached(&self, key: &GroupKey) -> Option<TagId> {
        self.cache.lock().await.get(key).cloned()
    }

    /// Resolves `key` to a tag, creating the tag on first use.
    ///
    /// A tag already named after the group is adopted instead of created.
    /// Failures are not cached, so the next call retries.
    ///
    /// # Examples
    ///
    /// ```
    /// use role_sync::effects::{PlatformEffect, PlatformInterpreter, PlatformResponse, TagData};
    /// use role_sync::provision::TagProvisioner;
    /// use role_sync::types::GroupKey;
    ///
    /// struct EmptyGuild;
    ///
    /// impl PlatformInterpreter for EmptyGuild {
    ///     type Error = std::convert::Infallible;
    ///
    ///     async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, Self::Error> {
    ///         Ok(match effect {
    ///             PlatformEffect::ListTags => PlatformResponse::Tags(vec![]),
    ///             PlatformEffect::CreateTag { name } => PlatformResponse::Tag(TagData {
    ///                 id: "900".into(),
    ///                 name,
    ///             }),
    ///             _ => PlatformResponse::Ok,
    ///         })
    ///     }
    /// }
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let provisioner = TagProvisioner::new();
    /// let key = GroupKey::range(7, 115);
    ///
    /// let first = provisioner.ensure_tag(&EmptyGuild, &key, "K7-K115").await.unwrap();
    /// let second = provisioner.ensure_tag(&EmptyGuild, &key, "K7-K115").await.unwrap();
    /// assert_eq!(first, second);
    /// # }
    /// ```
    #[instrument(skip(self, platform), fields(group = %key))]
    pub async fn ensure_tag<P: PlatformInterpreter>(
        &self,
        platform: &P,
        key: &GroupKey,
        label: &str,
    ) -> Result<TagId, ProvisionError> {
        let mut cache = self.cache.lock().await;
        if let Some(tag) = cache.get(key) {
            return Ok(tag.clone());
        }

        let name = derived_tag_name(key, label);
        let tag = match find_by_name(platform, &name).await? {
            Some(existing) => {
                debug!(tag = %existing.id, name = %name, "Reusing existing tag");
                existing.id
            }
            None => {
                let created = create(platform, &name).await?;
                info!(tag = %created.id, name = %name, "Created tag for group");
                created.id
            }
        };

        cache.insert(key.clone(), tag.clone());
        Ok(tag)
    }

    /// Resolves `key` only if a tag already exists; never creates one.
    ///
    /// Used for groups nobody is eligible for, so that stale holders can still
    /// be found without provisioning an empty tag.
    pub async fn find_tag<P: PlatformInterpreter>(
        &self,
        platform: &P,
        key: &GroupKey,
        label: &str,
    ) -> Result<Option<TagId>, ProvisionError> {
        let mut cache = self.cache.lock().await;
        if let Some(tag) = cache.get(key) {
            return Ok(Some(tag.clone()));
        }

        let name = derived_tag_name(key, label);
        let found = find_by_name(platform, &name).await?;
        if let Some(existing) = &found {
            cache.insert(key.clone(), existing.id.clone());
        }
        Ok(found.map(|t| t.id))
    }
}

async fn find_by_name<P: PlatformInterpreter>(
    platform: &P,
    name: &str,
) -> Result<Option<TagData>, ProvisionError> {
    match platform
        .interpret(PlatformEffect::ListTags)
        .await
        .map_err(|e| ProvisionError::List(e.to_string()))?
    {
        PlatformResponse::Tags(tags) => Ok(tags.into_iter().find(|t| t.name == name)),
        _ => Err(ProvisionError::UnexpectedResponse("ListTags")),
    }
}

async fn create<P: PlatformInterpreter>(
    platform: &P,
    name: &str,
) -> Result<TagData, ProvisionError> {
    let effect = PlatformEffect::CreateTag {
        name: name.to_string(),
    };
    match platform
        .interpret(effect)
        .await
        .map_err(|e| ProvisionError::Create {
            name: name.to_string(),
            message: e.to_string(),
        })? {
        PlatformResponse::Tag(tag) => Ok(tag),
        _ => Err(ProvisionError::UnexpectedResponse("CreateTag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_utils::MockPlatform;

    fn is_create(e: &PlatformEffect) -> bool {
        matches!(e, PlatformEffect::CreateTag { .. })
    }

    #[tokio::test]
    async fn repeated_ensure_creates_once() {
        let platform = MockPlatform::new();
        let provisioner = TagProvisioner::new();
        let key = GroupKey::range(7, 115);

        let first = provisioner
            .ensure_tag(&platform, &key, "K7–K115")
            .await
            .unwrap();
        let second = provisioner
            .ensure_tag(&platform, &key, "K7–K115")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.count_effects(is_create), 1);
        assert_eq!(platform.tags()[0].name, "K7–K115");
    }

    #[tokio::test]
    async fn existing_tag_with_derived_name_is_reused() {
        let platform = MockPlatform::new().with_tag("555", "K1-K6");
        let provisioner = TagProvisioner::new();

        let tag = provisioner
            .ensure_tag(&platform, &GroupKey::range(1, 6), "  K1-K6 ")
            .await
            .unwrap();

        assert_eq!(tag, TagId::from("555"));
        assert_eq!(platform.count_effects(is_create), 0);
    }

    #[tokio::test]
    async fn concurrent_ensures_for_one_key_create_once() {
        let platform = Arc::new(MockPlatform::new());
        let provisioner = Arc::new(TagProvisioner::new());
        let key = GroupKey::range(7, 115);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let platform = Arc::clone(&platform);
            let provisioner = Arc::clone(&provisioner);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                provisioner
                    .ensure_tag(platform.as_ref(), &key, "K7-K115")
                    .await
                    .unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(platform.count_effects(is_create), 1);
    }

    #[tokio::test]
    async fn creation_failure_is_not_cached() {
        let platform = MockPlatform::new();
        let provisioner = TagProvisioner::new();
        let key = GroupKey::range(1, 6);

        platform.set_fail_create_tag(true);
        let err = provisioner.ensure_tag(&platform, &key, "K1-K6").await;
        assert!(matches!(err, Err(ProvisionError::Create { .. })));
        assert!(provisioner.cached(&key).await.is_none());

        platform.set_fail_create_tag(false);
        assert!(provisioner.ensure_tag(&platform, &key, "K1-K6").await.is_ok());
    }

    #[tokio::test]
    async fn find_tag_never_creates() {
        let platform = MockPlatform::new();
        let provisioner = TagProvisioner::new();

        let found = provisioner
            .find_tag(&platform, &GroupKey::range(1, 6), "K1-K6")
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(platform.count_effects(is_create), 0);
    }

    #[test]
    fn blank_label_falls_back_to_key() {
        assert_eq!(derived_tag_name(&GroupKey::range(3, 4), "   "), "3-4");
    }
}
