//! Tag store
//!
//! Typed read and write operations on the tag set of one image or snapshot,
//! including the comma-joined multi-value convention used by
//! `shipami:copied_to`.
//!
//! Read-modify-write sequences (`append`, `remove_value`) are not atomic
//! with respect to other writers: the service has no conditional tagging.

use shipami_core::{Error, Result, Tag};
use tracing::{debug, Instrument, Span};

use crate::resource::{tag_value, TaggedResource};

/// Tag marking an image created by shipami
pub const MANAGED: &str = "shipami:managed";
/// Release label of a protected image
pub const RELEASE: &str = "shipami:release";
/// `region:id` of the image this one was copied from
pub const COPIED_FROM: &str = "shipami:copied_from";
/// Comma-joined `region:id` list of the copies of this image
pub const COPIED_TO: &str = "shipami:copied_to";

/// Value written to [`MANAGED`]
pub const MANAGED_VALUE: &str = "True";

const SEPARATOR: char = ',';

/// Split a multi-value tag, dropping empty entries
pub fn split_multi(value: &str) -> Vec<&str> {
    value
        .split(SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

pub fn join_multi<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Tag operations bound to a logging span
#[derive(Debug, Clone)]
pub struct TagStore {
    span: Span,
}

impl TagStore {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// First value of `key`, or `None`
    pub async fn get<R>(&self, resource: &mut R, key: &str) -> Result<Option<String>>
    where
        R: TaggedResource + ?Sized,
    {
        let tags = resource.current_tags().instrument(self.span.clone()).await?;
        Ok(tag_value(&tags, key))
    }

    pub async fn set<R>(&self, resource: &mut R, key: &str, value: &str) -> Result<()>
    where
        R: TaggedResource + ?Sized,
    {
        self.set_many(resource, &[Tag::new(key, value)]).await
    }

    /// Upsert several tags in one call
    pub async fn set_many<R>(&self, resource: &mut R, tags: &[Tag]) -> Result<()>
    where
        R: TaggedResource + ?Sized,
    {
        if tags.is_empty() {
            return Ok(());
        }

        async {
            for tag in tags {
                debug!("set {}={} on {}", tag.key, tag.value, resource.resource_id());
            }
            resource
                .client()
                .create_tags(resource.resource_id(), tags)
                .await?;
            resource.record_set(tags);
            Ok::<_, Error>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Add `value` to a multi-value tag, creating it when absent or empty
    pub async fn append<R>(&self, resource: &mut R, key: &str, value: &str) -> Result<()>
    where
        R: TaggedResource + ?Sized,
    {
        let value = match self.get(resource, key).await? {
            Some(current) if !current.is_empty() => format!("{}{}{}", current, SEPARATOR, value),
            _ => value.to_string(),
        };
        self.set(resource, key, &value).await
    }

    /// Remove every entry equal to `value` from a multi-value tag
    ///
    /// Deletes the key when nothing remains. A missing key is a no-op.
    /// Returns the remaining joined value, or `None` when the key is gone.
    pub async fn remove_value<R>(
        &self,
        resource: &mut R,
        key: &str,
        value: &str,
    ) -> Result<Option<String>>
    where
        R: TaggedResource + ?Sized,
    {
        let Some(current) = self.get(resource, key).await? else {
            self.span.in_scope(|| {
                debug!("{} has no {} tag, nothing to remove", resource.resource_id(), key)
            });
            return Ok(None);
        };

        let remaining: Vec<&str> = split_multi(&current)
            .into_iter()
            .filter(|entry| *entry != value)
            .collect();

        if remaining.is_empty() {
            self.delete(resource, key).await?;
            return Ok(None);
        }

        let remaining = join_multi(remaining);
        if remaining != current {
            self.set(resource, key, &remaining).await?;
        }
        Ok(Some(remaining))
    }

    /// Remove a tag key entirely
    pub async fn delete<R>(&self, resource: &mut R, key: &str) -> Result<()>
    where
        R: TaggedResource + ?Sized,
    {
        async {
            debug!("delete {} on {}", key, resource.resource_id());
            let keys = [key.to_string()];
            resource
                .client()
                .delete_tags(resource.resource_id(), &keys)
                .await?;
            resource.record_delete(&keys);
            Ok::<_, Error>(())
        }
        .instrument(self.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ImageRef;
    use shipami_ec2::mock::MockEc2Cloud;
    use std::sync::Arc;

    fn fixture() -> (MockEc2Cloud, ImageRef, TagStore) {
        let cloud = MockEc2Cloud::new();
        let id = cloud.register_image("eu-west-1", "foo", &[]);
        let image = ImageRef::new(Arc::new(cloud.client("eu-west-1")), id);
        (cloud, image, TagStore::new(Span::none()))
    }

    #[test]
    fn test_split_multi_ignores_empty_entries() {
        assert_eq!(split_multi("a,,b,"), vec!["a", "b"]);
        assert!(split_multi("").is_empty());
        assert_eq!(join_multi(["a", "b"]), "a,b");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (cloud, mut image, store) = fixture();

        store.set(&mut image, "k", "v").await.unwrap();

        assert_eq!(store.get(&mut image, "k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cloud.image(image.id()).unwrap().tag("k"), Some("v"));
    }

    #[tokio::test]
    async fn test_append_builds_list() {
        let (cloud, mut image, store) = fixture();

        store.append(&mut image, COPIED_TO, "eu-west-1:ami-1").await.unwrap();
        store.append(&mut image, COPIED_TO, "us-east-1:ami-2").await.unwrap();

        assert_eq!(
            cloud.image(image.id()).unwrap().tag(COPIED_TO),
            Some("eu-west-1:ami-1,us-east-1:ami-2")
        );
    }

    #[tokio::test]
    async fn test_append_over_empty_value() {
        let (cloud, mut image, store) = fixture();
        cloud.seed_tag(image.id(), COPIED_TO, "");

        store.append(&mut image, COPIED_TO, "eu-west-1:ami-1").await.unwrap();

        assert_eq!(
            cloud.image(image.id()).unwrap().tag(COPIED_TO),
            Some("eu-west-1:ami-1")
        );
    }

    #[tokio::test]
    async fn test_remove_value_keeps_other_entries() {
        let (cloud, mut image, store) = fixture();
        cloud.seed_tag(image.id(), COPIED_TO, "r:a,r:b,r:a,r:c");

        let remaining = store.remove_value(&mut image, COPIED_TO, "r:a").await.unwrap();

        assert_eq!(remaining.as_deref(), Some("r:b,r:c"));
        assert_eq!(cloud.image(image.id()).unwrap().tag(COPIED_TO), Some("r:b,r:c"));
    }

    #[tokio::test]
    async fn test_remove_only_value_deletes_key() {
        let (cloud, mut image, store) = fixture();
        cloud.seed_tag(image.id(), "k", "v");

        let remaining = store.remove_value(&mut image, "k", "v").await.unwrap();

        assert_eq!(remaining, None);
        assert_eq!(store.get(&mut image, "k").await.unwrap(), None);
        assert_eq!(cloud.image(image.id()).unwrap().tag("k"), None);
    }

    #[tokio::test]
    async fn test_remove_value_on_missing_key_is_noop() {
        let (cloud, mut image, store) = fixture();

        let remaining = store.remove_value(&mut image, "k", "v").await.unwrap();

        assert_eq!(remaining, None);
        assert!(!cloud.was_called("delete_tags"));
        assert!(!cloud.was_called("create_tags"));
    }

    #[tokio::test]
    async fn test_set_failure_leaves_cache_untouched() {
        let (cloud, mut image, store) = fixture();
        store.get(&mut image, "k").await.unwrap();
        cloud.fail_next("create_tags", "Tag limit exceeded");

        let err = store.set(&mut image, "k", "v").await.unwrap_err();

        assert_eq!(err.to_string(), "Tag limit exceeded");
        assert_eq!(store.get(&mut image, "k").await.unwrap(), None);
    }
}
