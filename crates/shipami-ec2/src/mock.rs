//! In-memory EC2 model for tests
//!
//! `MockEc2Cloud` holds images, snapshots, tags and permissions for any
//! number of regions. Each [`MockEc2`] client sees only its own region, the
//! way a real regional endpoint does.
//!
//! Copies start `pending` and become `available` (or `completed` for
//! snapshots) after a configurable number of describe calls, with block
//! device mappings hidden until then.

use async_trait::async_trait;
use chrono::Utc;
use shipami_core::{
    BlockDeviceMapping, CopyImageRequest, Error, Image, ImageState, PermissionAttribute,
    PermissionOperation, Principal, Result, Snapshot, SnapshotState, Tag,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::session::ClientFactory;
use crate::traits::Ec2Api;

#[derive(Debug, Clone)]
struct MockImageRecord {
    image: Image,
    polls_until_available: u32,
    launch_permissions: Vec<Principal>,
}

#[derive(Debug, Clone)]
struct MockSnapshotRecord {
    snapshot: Snapshot,
    polls_until_completed: u32,
    volume_permissions: Vec<Principal>,
}

#[derive(Debug, Default)]
struct CloudState {
    images: HashMap<String, MockImageRecord>,
    snapshots: HashMap<String, MockSnapshotRecord>,
    next_id: u32,
    settle_polls: u32,
    failures: HashMap<String, String>,
    api_calls: Vec<String>,
}

impl CloudState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    fn record(&mut self, region: &str, operation: &str, subject: &str) -> Result<()> {
        self.api_calls
            .push(format!("{}({}, {})", operation, region, subject));
        match self.failures.remove(operation) {
            Some(message) => Err(Error::remote(message)),
            None => Ok(()),
        }
    }

    fn tags_mut(&mut self, region: &str, resource_id: &str) -> Result<&mut Vec<Tag>> {
        if let Some(record) = self.images.get_mut(resource_id) {
            if record.image.region == region {
                return Ok(&mut record.image.tags);
            }
        }
        if let Some(record) = self.snapshots.get_mut(resource_id) {
            if record.snapshot.region == region {
                return Ok(&mut record.snapshot.tags);
            }
        }
        Err(Error::not_found(resource_id))
    }

    fn image_in(&mut self, region: &str, image_id: &str) -> Result<&mut MockImageRecord> {
        self.images
            .get_mut(image_id)
            .filter(|record| record.image.region == region)
            .ok_or_else(|| Error::not_found(image_id))
    }

    fn snapshot_in(&mut self, region: &str, snapshot_id: &str) -> Result<&mut MockSnapshotRecord> {
        self.snapshots
            .get_mut(snapshot_id)
            .filter(|record| record.snapshot.region == region)
            .ok_or_else(|| Error::not_found(snapshot_id))
    }

    fn permissions_mut(
        &mut self,
        region: &str,
        resource_id: &str,
        attribute: PermissionAttribute,
    ) -> Result<&mut Vec<Principal>> {
        match attribute {
            PermissionAttribute::LaunchPermission => self
                .image_in(region, resource_id)
                .map(|record| &mut record.launch_permissions),
            PermissionAttribute::CreateVolumePermission => self
                .snapshot_in(region, resource_id)
                .map(|record| &mut record.volume_permissions),
        }
    }
}

/// Observe a pending image, advancing it one poll towards `available`
fn poll_image(record: &mut MockImageRecord) -> Image {
    if record.image.state == ImageState::Pending {
        if record.polls_until_available == 0 {
            record.image.state = ImageState::Available;
        } else {
            record.polls_until_available -= 1;
        }
    }

    let mut view = record.image.clone();
    if view.state == ImageState::Pending {
        view.block_device_mappings.clear();
    }
    view
}

fn poll_snapshot(record: &mut MockSnapshotRecord) -> Snapshot {
    if record.snapshot.state == SnapshotState::Pending {
        if record.polls_until_completed == 0 {
            record.snapshot.state = SnapshotState::Completed;
        } else {
            record.polls_until_completed -= 1;
        }
    }
    record.snapshot.clone()
}

fn upsert_tags(target: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        match target.iter_mut().find(|existing| existing.key == tag.key) {
            Some(existing) => existing.value = tag.value.clone(),
            None => target.push(tag.clone()),
        }
    }
}

/// Shared in-memory cloud
#[derive(Debug, Clone, Default)]
pub struct MockEc2Cloud {
    state: Arc<Mutex<CloudState>>,
}

impl MockEc2Cloud {
    /// New cloud where copies settle after one pending observation
    pub fn new() -> Self {
        Self::with_settle_polls(1)
    }

    /// New cloud where copies stay `pending` for `polls` describe calls
    pub fn with_settle_polls(polls: u32) -> Self {
        let cloud = Self::default();
        cloud.state().settle_polls = polls;
        cloud
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Client bound to one region
    pub fn client(&self, region: &str) -> MockEc2 {
        MockEc2 {
            cloud: self.clone(),
            region: region.to_string(),
        }
    }

    /// Factory for a [`SessionRegistry`](crate::SessionRegistry)
    pub fn factory(&self) -> ClientFactory {
        let cloud = self.clone();
        Arc::new(move |region: &str| Arc::new(cloud.client(region)) as Arc<dyn Ec2Api>)
    }

    /// Seed an available image with one completed snapshot per device
    pub fn register_image(&self, region: &str, name: &str, devices: &[&str]) -> String {
        let mut state = self.state();
        let image_id = state.next_id("ami");

        let mut block_device_mappings = Vec::new();
        for device in devices {
            let snapshot_id = state.next_id("snap");
            state.snapshots.insert(
                snapshot_id.clone(),
                MockSnapshotRecord {
                    snapshot: Snapshot {
                        id: snapshot_id.clone(),
                        state: SnapshotState::Completed,
                        region: region.to_string(),
                        tags: Vec::new(),
                    },
                    polls_until_completed: 0,
                    volume_permissions: Vec::new(),
                },
            );
            block_device_mappings.push(BlockDeviceMapping {
                device_name: device.to_string(),
                snapshot_id: Some(snapshot_id),
            });
        }

        state.images.insert(
            image_id.clone(),
            MockImageRecord {
                image: Image {
                    id: image_id.clone(),
                    name: name.to_string(),
                    description: Some(format!("{} image", name)),
                    state: ImageState::Available,
                    creation_date: Some(Utc::now()),
                    region: region.to_string(),
                    tags: Vec::new(),
                    block_device_mappings,
                },
                polls_until_available: 0,
                launch_permissions: Vec::new(),
            },
        );

        image_id
    }

    /// Seed a tag on an image or snapshot without recording an API call
    pub fn seed_tag(&self, resource_id: &str, key: &str, value: &str) {
        let mut state = self.state();
        let tag = Tag::new(key, value);
        if let Some(record) = state.images.get_mut(resource_id) {
            upsert_tags(&mut record.image.tags, &[tag]);
        } else if let Some(record) = state.snapshots.get_mut(resource_id) {
            upsert_tags(&mut record.snapshot.tags, &[tag]);
        }
    }

    /// Seed a permission on an image (launch) or snapshot (create volume)
    pub fn seed_permission(&self, resource_id: &str, principal: Principal) {
        let mut state = self.state();
        if let Some(record) = state.images.get_mut(resource_id) {
            record.launch_permissions.push(principal);
        } else if let Some(record) = state.snapshots.get_mut(resource_id) {
            record.volume_permissions.push(principal);
        }
    }

    pub fn set_image_state(&self, image_id: &str, image_state: ImageState) {
        if let Some(record) = self.state().images.get_mut(image_id) {
            record.image.state = image_state;
        }
    }

    pub fn set_snapshot_state(&self, snapshot_id: &str, snapshot_state: SnapshotState) {
        if let Some(record) = self.state().snapshots.get_mut(snapshot_id) {
            record.snapshot.state = snapshot_state;
        }
    }

    /// Make the next call of `operation` fail with `message`
    pub fn fail_next(&self, operation: &str, message: &str) {
        self.state()
            .failures
            .insert(operation.to_string(), message.to_string());
    }

    /// Current image view, ignoring region and pending visibility
    pub fn image(&self, image_id: &str) -> Option<Image> {
        self.state()
            .images
            .get(image_id)
            .map(|record| record.image.clone())
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<Snapshot> {
        self.state()
            .snapshots
            .get(snapshot_id)
            .map(|record| record.snapshot.clone())
    }

    /// Launch permissions of an image or create-volume permissions of a snapshot
    pub fn permissions(&self, resource_id: &str) -> Vec<Principal> {
        let state = self.state();
        if let Some(record) = state.images.get(resource_id) {
            return record.launch_permissions.clone();
        }
        state
            .snapshots
            .get(resource_id)
            .map(|record| record.volume_permissions.clone())
            .unwrap_or_default()
    }

    /// Snapshot ids backing an image, visible or not
    pub fn snapshot_ids(&self, image_id: &str) -> Vec<String> {
        self.image(image_id)
            .map(|image| {
                image
                    .snapshot_devices()
                    .map(|(_, snapshot_id)| snapshot_id.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn image_count(&self, region: &str) -> usize {
        self.state()
            .images
            .values()
            .filter(|record| record.image.region == region)
            .count()
    }

    pub fn api_calls(&self) -> Vec<String> {
        self.state().api_calls.clone()
    }

    pub fn was_called(&self, operation: &str) -> bool {
        self.call_count(operation) > 0
    }

    pub fn call_count(&self, operation: &str) -> usize {
        let prefix = format!("{}(", operation);
        self.state()
            .api_calls
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }
}

/// Regional client of a [`MockEc2Cloud`]
#[derive(Debug, Clone)]
pub struct MockEc2 {
    cloud: MockEc2Cloud,
    region: String,
}

#[async_trait]
impl Ec2Api for MockEc2 {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_images(&self, image_ids: &[String]) -> Result<Vec<Image>> {
        let mut state = self.cloud.state();
        state.record(&self.region, "describe_images", &image_ids.join(","))?;

        if image_ids.is_empty() {
            let region = self.region.as_str();
            let mut images: Vec<Image> = state
                .images
                .values_mut()
                .filter(|record| record.image.region == region)
                .map(poll_image)
                .collect();
            images.sort_by(|a, b| a.id.cmp(&b.id));
            return Ok(images);
        }

        image_ids
            .iter()
            .map(|id| state.image_in(&self.region, id).map(poll_image))
            .collect()
    }

    async fn describe_snapshots(&self, snapshot_ids: &[String]) -> Result<Vec<Snapshot>> {
        let mut state = self.cloud.state();
        state.record(&self.region, "describe_snapshots", &snapshot_ids.join(","))?;

        snapshot_ids
            .iter()
            .map(|id| state.snapshot_in(&self.region, id).map(poll_snapshot))
            .collect()
    }

    async fn copy_image(&self, request: &CopyImageRequest) -> Result<String> {
        let mut state = self.cloud.state();
        state.record(&self.region, "copy_image", &request.source_image_id)?;

        let source = state
            .image_in(&request.source_region, &request.source_image_id)?
            .image
            .clone();
        let settle_polls = state.settle_polls;
        let image_id = state.next_id("ami");

        let mut block_device_mappings = Vec::new();
        for mapping in &source.block_device_mappings {
            let snapshot_id = match &mapping.snapshot_id {
                Some(_) => {
                    let snapshot_id = state.next_id("snap");
                    state.snapshots.insert(
                        snapshot_id.clone(),
                        MockSnapshotRecord {
                            snapshot: Snapshot {
                                id: snapshot_id.clone(),
                                state: SnapshotState::Pending,
                                region: self.region.clone(),
                                tags: Vec::new(),
                            },
                            polls_until_completed: settle_polls,
                            volume_permissions: Vec::new(),
                        },
                    );
                    Some(snapshot_id)
                }
                None => None,
            };
            block_device_mappings.push(BlockDeviceMapping {
                device_name: mapping.device_name.clone(),
                snapshot_id,
            });
        }

        state.images.insert(
            image_id.clone(),
            MockImageRecord {
                image: Image {
                    id: image_id.clone(),
                    name: request.name.clone(),
                    description: request.description.clone(),
                    state: ImageState::Pending,
                    creation_date: Some(Utc::now()),
                    region: self.region.clone(),
                    tags: Vec::new(),
                    block_device_mappings,
                },
                polls_until_available: settle_polls,
                launch_permissions: Vec::new(),
            },
        );

        Ok(image_id)
    }

    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<()> {
        let mut state = self.cloud.state();
        state.record(&self.region, "create_tags", resource_id)?;
        upsert_tags(state.tags_mut(&self.region, resource_id)?, tags);
        Ok(())
    }

    async fn delete_tags(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        let mut state = self.cloud.state();
        state.record(&self.region, "delete_tags", resource_id)?;
        state
            .tags_mut(&self.region, resource_id)?
            .retain(|tag| !keys.contains(&tag.key));
        Ok(())
    }

    async fn describe_permissions(
        &self,
        resource_id: &str,
        attribute: PermissionAttribute,
    ) -> Result<Vec<Principal>> {
        let mut state = self.cloud.state();
        state.record(&self.region, "describe_permissions", resource_id)?;
        state
            .permissions_mut(&self.region, resource_id, attribute)
            .map(|permissions| permissions.clone())
    }

    async fn modify_permissions(
        &self,
        resource_id: &str,
        attribute: PermissionAttribute,
        operation: PermissionOperation,
        principals: &[Principal],
    ) -> Result<()> {
        let mut state = self.cloud.state();
        state.record(&self.region, "modify_permissions", resource_id)?;
        let permissions = state.permissions_mut(&self.region, resource_id, attribute)?;

        match operation {
            PermissionOperation::Add => {
                for principal in principals {
                    if !permissions.contains(principal) {
                        permissions.push(principal.clone());
                    }
                }
            }
            PermissionOperation::Remove => {
                permissions.retain(|principal| !principals.contains(principal));
            }
        }
        Ok(())
    }

    async fn deregister_image(&self, image_id: &str) -> Result<()> {
        let mut state = self.cloud.state();
        state.record(&self.region, "deregister_image", image_id)?;
        state.image_in(&self.region, image_id)?;
        state.images.remove(image_id);
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut state = self.cloud.state();
        state.record(&self.region, "delete_snapshot", snapshot_id)?;
        state.snapshot_in(&self.region, snapshot_id)?;
        state.snapshots.remove(snapshot_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_only_sees_its_region() {
        let cloud = MockEc2Cloud::new();
        let id = cloud.register_image("eu-west-1", "foo", &["/dev/xvda"]);

        let eu = cloud.client("eu-west-1");
        let us = cloud.client("us-east-1");

        assert_eq!(eu.describe_images(&[]).await.unwrap().len(), 1);
        assert!(us.describe_images(&[]).await.unwrap().is_empty());
        assert!(us.describe_images(&[id]).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_copy_settles_after_polls() {
        let cloud = MockEc2Cloud::with_settle_polls(2);
        let source = cloud.register_image("eu-west-1", "foo", &["/dev/xvda"]);
        let us = cloud.client("us-east-1");

        let copy = us
            .copy_image(&CopyImageRequest {
                source_region: "eu-west-1".to_string(),
                source_image_id: source,
                name: "foo".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let ids = vec![copy];
        for _ in 0..2 {
            let image = us.describe_images(&ids).await.unwrap().remove(0);
            assert_eq!(image.state, ImageState::Pending);
            assert!(image.block_device_mappings.is_empty());
        }
        let image = us.describe_images(&ids).await.unwrap().remove(0);
        assert_eq!(image.state, ImageState::Available);
        assert_eq!(image.snapshot_devices().count(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let cloud = MockEc2Cloud::new();
        let client = cloud.client("eu-west-1");
        cloud.fail_next("describe_images", "Request limit exceeded.");

        let err = client.describe_images(&[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Request limit exceeded.");
        assert!(client.describe_images(&[]).await.is_ok());
        assert_eq!(cloud.call_count("describe_images"), 2);
    }

    #[tokio::test]
    async fn test_create_tags_upserts_first_match() {
        let cloud = MockEc2Cloud::new();
        let id = cloud.register_image("eu-west-1", "foo", &[]);
        let client = cloud.client("eu-west-1");

        client.create_tags(&id, &[Tag::new("k", "v1")]).await.unwrap();
        client.create_tags(&id, &[Tag::new("k", "v2")]).await.unwrap();

        let image = cloud.image(&id).unwrap();
        assert_eq!(image.tags, vec![Tag::new("k", "v2")]);
    }
}
