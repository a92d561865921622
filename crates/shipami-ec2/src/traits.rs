//! Remote image service trait
//!
//! One `Ec2Api` value talks to exactly one region. Cross-region work is done
//! by asking the [`SessionRegistry`](crate::SessionRegistry) for the client of
//! the other region.

use async_trait::async_trait;
use shipami_core::{
    CopyImageRequest, Image, PermissionAttribute, PermissionOperation, Principal, Result,
    Snapshot, Tag,
};

#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Region this client is bound to
    fn region(&self) -> &str;

    /// Describe images owned by the caller
    ///
    /// An empty `image_ids` lists every owned image. Ids that do not resolve
    /// are either omitted from the result or reported as `NotFound`.
    async fn describe_images(&self, image_ids: &[String]) -> Result<Vec<Image>>;

    /// Describe snapshots by id
    async fn describe_snapshots(&self, snapshot_ids: &[String]) -> Result<Vec<Snapshot>>;

    /// Copy an image into this client's region, returning the new image id
    ///
    /// The new image is returned while still `pending`.
    async fn copy_image(&self, request: &CopyImageRequest) -> Result<String>;

    /// Upsert tags on an image or snapshot
    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<()>;

    /// Remove tag keys from an image or snapshot
    async fn delete_tags(&self, resource_id: &str, keys: &[String]) -> Result<()>;

    /// Read a permission list
    ///
    /// `LaunchPermission` applies to images, `CreateVolumePermission` to snapshots.
    async fn describe_permissions(
        &self,
        resource_id: &str,
        attribute: PermissionAttribute,
    ) -> Result<Vec<Principal>>;

    /// Add principals to, or remove them from, a permission list
    async fn modify_permissions(
        &self,
        resource_id: &str,
        attribute: PermissionAttribute,
        operation: PermissionOperation,
        principals: &[Principal],
    ) -> Result<()>;

    /// Deregister an image. Irreversible.
    async fn deregister_image(&self, image_id: &str) -> Result<()>;

    /// Delete a snapshot. Irreversible.
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}
