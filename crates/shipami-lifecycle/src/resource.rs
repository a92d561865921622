//! Resource references
//!
//! An [`ImageRef`] or [`SnapshotRef`] always carries the resource id, the
//! regional client that owns it, and a lazily fetched view of its remote
//! state. Callers never branch on whether they hold an id or a description.

use async_trait::async_trait;
use shipami_core::{find_tag, Error, Image, Result, Snapshot, Tag};
use shipami_ec2::Ec2Api;
use std::sync::Arc;

use crate::lineage::ImagePointer;

/// A resource whose tag set can be read and written
#[async_trait]
pub trait TaggedResource: Send {
    fn resource_id(&self) -> &str;

    fn client(&self) -> &Arc<dyn Ec2Api>;

    /// Tags from the cached view, fetching it first if needed
    async fn current_tags(&mut self) -> Result<Vec<Tag>>;

    /// Reflect an upsert in the cached view
    fn record_set(&mut self, tags: &[Tag]);

    /// Reflect a key deletion in the cached view
    fn record_delete(&mut self, keys: &[String]);
}

fn apply_set(target: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        match target.iter_mut().find(|existing| existing.key == tag.key) {
            Some(existing) => existing.value = tag.value.clone(),
            None => target.push(tag.clone()),
        }
    }
}

fn apply_delete(target: &mut Vec<Tag>, keys: &[String]) {
    target.retain(|tag| !keys.contains(&tag.key));
}

/// Image handle: id, owning region and cached detail
#[derive(Clone)]
pub struct ImageRef {
    id: String,
    client: Arc<dyn Ec2Api>,
    detail: Option<Image>,
}

impl ImageRef {
    pub fn new(client: Arc<dyn Ec2Api>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client,
            detail: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn region(&self) -> &str {
        self.client.region()
    }

    /// `region:id` pointer naming this image
    pub fn pointer(&self) -> ImagePointer {
        ImagePointer::new(self.region(), &self.id)
    }

    /// Cached view, fetched on first use
    pub async fn describe(&mut self) -> Result<&Image> {
        if self.detail.is_none() {
            self.refresh().await?;
        }
        self.detail
            .as_ref()
            .ok_or_else(|| Error::not_found(&self.id))
    }

    /// Fetch a fresh view, replacing the cached one
    pub async fn refresh(&mut self) -> Result<&Image> {
        let image = self
            .client
            .describe_images(std::slice::from_ref(&self.id))
            .await?
            .into_iter()
            .find(|image| image.id == self.id)
            .ok_or_else(|| Error::not_found(&self.id))?;

        let image: &Image = self.detail.insert(image);
        Ok(image)
    }

    pub fn cached(&self) -> Option<&Image> {
        self.detail.as_ref()
    }

    /// Snapshot-backed devices of the cached view
    ///
    /// Only meaningful once the image is `available`.
    pub fn snapshots(&self) -> Vec<(String, SnapshotRef)> {
        self.detail
            .as_ref()
            .map(|image| {
                image
                    .snapshot_devices()
                    .map(|(device, snapshot_id)| {
                        (
                            device.to_string(),
                            SnapshotRef::new(self.client.clone(), snapshot_id),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRef")
            .field("id", &self.id)
            .field("region", &self.region())
            .field("cached", &self.detail.is_some())
            .finish()
    }
}

#[async_trait]
impl TaggedResource for ImageRef {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client(&self) -> &Arc<dyn Ec2Api> {
        &self.client
    }

    async fn current_tags(&mut self) -> Result<Vec<Tag>> {
        Ok(self.describe().await?.tags.clone())
    }

    fn record_set(&mut self, tags: &[Tag]) {
        if let Some(image) = self.detail.as_mut() {
            apply_set(&mut image.tags, tags);
        }
    }

    fn record_delete(&mut self, keys: &[String]) {
        if let Some(image) = self.detail.as_mut() {
            apply_delete(&mut image.tags, keys);
        }
    }
}

/// Snapshot handle: id, owning region and cached detail
#[derive(Clone)]
pub struct SnapshotRef {
    id: String,
    client: Arc<dyn Ec2Api>,
    detail: Option<Snapshot>,
}

impl SnapshotRef {
    pub fn new(client: Arc<dyn Ec2Api>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client,
            detail: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn describe(&mut self) -> Result<&Snapshot> {
        if self.detail.is_none() {
            self.refresh().await?;
        }
        self.detail
            .as_ref()
            .ok_or_else(|| Error::not_found(&self.id))
    }

    pub async fn refresh(&mut self) -> Result<&Snapshot> {
        let snapshot = self
            .client
            .describe_snapshots(std::slice::from_ref(&self.id))
            .await?
            .into_iter()
            .find(|snapshot| snapshot.id == self.id)
            .ok_or_else(|| Error::not_found(&self.id))?;

        let snapshot: &Snapshot = self.detail.insert(snapshot);
        Ok(snapshot)
    }
}

impl std::fmt::Debug for SnapshotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotRef")
            .field("id", &self.id)
            .field("region", &self.client.region())
            .finish()
    }
}

#[async_trait]
impl TaggedResource for SnapshotRef {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn client(&self) -> &Arc<dyn Ec2Api> {
        &self.client
    }

    async fn current_tags(&mut self) -> Result<Vec<Tag>> {
        Ok(self.describe().await?.tags.clone())
    }

    fn record_set(&mut self, tags: &[Tag]) {
        if let Some(snapshot) = self.detail.as_mut() {
            apply_set(&mut snapshot.tags, tags);
        }
    }

    fn record_delete(&mut self, keys: &[String]) {
        if let Some(snapshot) = self.detail.as_mut() {
            apply_delete(&mut snapshot.tags, keys);
        }
    }
}

/// First value of `key` among `tags`, owned
pub(crate) fn tag_value(tags: &[Tag], key: &str) -> Option<String> {
    find_tag(tags, key).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipami_ec2::mock::MockEc2Cloud;

    #[tokio::test]
    async fn test_describe_is_cached_until_refresh() {
        let cloud = MockEc2Cloud::new();
        let id = cloud.register_image("eu-west-1", "foo", &["/dev/xvda"]);
        let mut image = ImageRef::new(Arc::new(cloud.client("eu-west-1")), &id);

        assert!(image.cached().is_none());
        assert_eq!(image.describe().await.unwrap().name, "foo");
        image.describe().await.unwrap();
        assert_eq!(cloud.call_count("describe_images"), 1);

        image.refresh().await.unwrap();
        assert_eq!(cloud.call_count("describe_images"), 2);
    }

    #[tokio::test]
    async fn test_pointer_uses_client_region() {
        let cloud = MockEc2Cloud::new();
        let image = ImageRef::new(Arc::new(cloud.client("ap-south-1")), "ami-1");
        assert_eq!(image.pointer().to_string(), "ap-south-1:ami-1");
    }

    #[tokio::test]
    async fn test_snapshots_follow_cached_mappings() {
        let cloud = MockEc2Cloud::new();
        let id = cloud.register_image("eu-west-1", "foo", &["/dev/xvda", "/dev/xvdb"]);
        let mut image = ImageRef::new(Arc::new(cloud.client("eu-west-1")), &id);

        assert!(image.snapshots().is_empty());
        image.describe().await.unwrap();

        let devices: Vec<_> = image
            .snapshots()
            .into_iter()
            .map(|(device, _)| device)
            .collect();
        assert_eq!(devices, vec!["/dev/xvda", "/dev/xvdb"]);
    }

    #[test]
    fn test_apply_set_and_delete() {
        let mut tags = vec![Tag::new("a", "1")];
        apply_set(&mut tags, &[Tag::new("a", "2"), Tag::new("b", "3")]);
        assert_eq!(tags, vec![Tag::new("a", "2"), Tag::new("b", "3")]);

        apply_delete(&mut tags, &["a".to_string()]);
        assert_eq!(tags, vec![Tag::new("b", "3")]);
    }

    #[tokio::test]
    async fn test_current_tags_read_first_match() {
        let cloud = MockEc2Cloud::new();
        let id = cloud.register_image("eu-west-1", "foo", &["/dev/xvda"]);
        cloud.seed_tag(&id, "team", "infra");
        let mut image = ImageRef::new(Arc::new(cloud.client("eu-west-1")), &id);

        let tags = image.current_tags().await.unwrap();
        assert_eq!(tag_value(&tags, "team").as_deref(), Some("infra"));
        assert_eq!(tag_value(&tags, "owner"), None);

        let duplicated = vec![Tag::new("k", "first"), Tag::new("k", "second")];
        assert_eq!(tag_value(&duplicated, "k").as_deref(), Some("first"));
    }
}
