//! AWS implementation of the image service
//!
//! Drives `aws ec2 ...` through `tokio::process::Command` and decodes the JSON
//! responses. Credentials and profiles are resolved by the CLI itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shipami_core::{
    BlockDeviceMapping, CopyImageRequest, Image, ImageState, PermissionAttribute,
    PermissionOperation, Principal, Result, Snapshot, SnapshotState, Tag,
};
use tracing::debug;

use crate::traits::Ec2Api;
use crate::utils;

/// EC2 client for one region, backed by the AWS CLI
#[derive(Debug, Clone)]
pub struct AwsCliEc2 {
    region: String,
    profile: Option<String>,
}

impl AwsCliEc2 {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
        }
    }

    fn command(&self, operation: &str) -> tokio::process::Command {
        utils::ec2_command(operation, &self.region, self.profile.as_deref())
    }
}

#[async_trait]
impl Ec2Api for AwsCliEc2 {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_images(&self, image_ids: &[String]) -> Result<Vec<Image>> {
        let mut cmd = self.command("describe-images");
        cmd.args(["--owners", "self"]);
        if !image_ids.is_empty() {
            cmd.arg("--image-ids").args(image_ids);
        }

        let response: DescribeImagesResponse =
            utils::run_json(cmd, "describe-images", &image_ids.join(",")).await?;

        Ok(response
            .images
            .into_iter()
            .map(|image| image.into_image(&self.region))
            .collect())
    }

    async fn describe_snapshots(&self, snapshot_ids: &[String]) -> Result<Vec<Snapshot>> {
        let mut cmd = self.command("describe-snapshots");
        cmd.arg("--snapshot-ids").args(snapshot_ids);

        let response: DescribeSnapshotsResponse =
            utils::run_json(cmd, "describe-snapshots", &snapshot_ids.join(",")).await?;

        Ok(response
            .snapshots
            .into_iter()
            .map(|snapshot| Snapshot {
                id: snapshot.snapshot_id,
                state: SnapshotState::from_service(&snapshot.state),
                region: self.region.clone(),
                tags: snapshot.tags.into_iter().map(Tag::from).collect(),
            })
            .collect())
    }

    async fn copy_image(&self, request: &CopyImageRequest) -> Result<String> {
        debug!(
            "copying image {} from {} to {}",
            request.source_image_id, request.source_region, self.region
        );

        let mut cmd = self.command("copy-image");
        cmd.args([
            "--source-region",
            &request.source_region,
            "--source-image-id",
            &request.source_image_id,
            "--name",
            &request.name,
        ]);
        if let Some(description) = &request.description {
            cmd.args(["--description", description]);
        }

        let response: CopyImageResponse =
            utils::run_json(cmd, "copy-image", &request.source_image_id).await?;
        Ok(response.image_id)
    }

    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> Result<()> {
        // JSON form: tag values may contain commas
        let tags: Vec<WireTag> = tags.iter().cloned().map(WireTag::from).collect();
        let tags = serde_json::to_string(&tags)?;

        let mut cmd = self.command("create-tags");
        cmd.args(["--resources", resource_id, "--tags", &tags]);

        utils::run(cmd, "create-tags", resource_id).await.map(drop)
    }

    async fn delete_tags(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        let keys: Vec<_> = keys.iter().map(|key| json!({ "Key": key })).collect();
        let keys = serde_json::to_string(&keys)?;

        let mut cmd = self.command("delete-tags");
        cmd.args(["--resources", resource_id, "--tags", &keys]);

        utils::run(cmd, "delete-tags", resource_id).await.map(drop)
    }

    async fn describe_permissions(
        &self,
        resource_id: &str,
        attribute: PermissionAttribute,
    ) -> Result<Vec<Principal>> {
        let response: AttributeResponse = match attribute {
            PermissionAttribute::LaunchPermission => {
                let mut cmd = self.command("describe-image-attribute");
                cmd.args(["--image-id", resource_id, "--attribute", "launchPermission"]);
                utils::run_json(cmd, "describe-image-attribute", resource_id).await?
            }
            PermissionAttribute::CreateVolumePermission => {
                let mut cmd = self.command("describe-snapshot-attribute");
                cmd.args([
                    "--snapshot-id",
                    resource_id,
                    "--attribute",
                    "createVolumePermission",
                ]);
                utils::run_json(cmd, "describe-snapshot-attribute", resource_id).await?
            }
        };

        Ok(response
            .launch_permissions
            .into_iter()
            .chain(response.create_volume_permissions)
            .filter_map(WirePermission::into_principal)
            .collect())
    }

    async fn modify_permissions(
        &self,
        resource_id: &str,
        attribute: PermissionAttribute,
        operation: PermissionOperation,
        principals: &[Principal],
    ) -> Result<()> {
        let entries: Vec<WirePermission> =
            principals.iter().map(WirePermission::from).collect();
        let change = match operation {
            PermissionOperation::Add => json!({ "Add": entries }),
            PermissionOperation::Remove => json!({ "Remove": entries }),
        };
        let change = serde_json::to_string(&change)?;

        let cmd = match attribute {
            PermissionAttribute::LaunchPermission => {
                let mut cmd = self.command("modify-image-attribute");
                cmd.args(["--image-id", resource_id, "--launch-permission", &change]);
                cmd
            }
            PermissionAttribute::CreateVolumePermission => {
                let mut cmd = self.command("modify-snapshot-attribute");
                cmd.args([
                    "--snapshot-id",
                    resource_id,
                    "--create-volume-permission",
                    &change,
                ]);
                cmd
            }
        };

        utils::run(cmd, "modify-attribute", resource_id).await.map(drop)
    }

    async fn deregister_image(&self, image_id: &str) -> Result<()> {
        let mut cmd = self.command("deregister-image");
        cmd.args(["--image-id", image_id]);
        utils::run(cmd, "deregister-image", image_id).await.map(drop)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        let mut cmd = self.command("delete-snapshot");
        cmd.args(["--snapshot-id", snapshot_id]);
        utils::run(cmd, "delete-snapshot", snapshot_id).await.map(drop)
    }
}

// Wire formats of the CLI's JSON output

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeImagesResponse {
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireImage {
    image_id: String,
    #[serde(default)]
    name: String,
    description: Option<String>,
    state: String,
    creation_date: Option<String>,
    #[serde(default)]
    tags: Vec<WireTag>,
    #[serde(default)]
    block_device_mappings: Vec<WireBlockDeviceMapping>,
}

impl WireImage {
    fn into_image(self, region: &str) -> Image {
        Image {
            id: self.image_id,
            name: self.name,
            description: self.description,
            state: ImageState::from_service(&self.state),
            creation_date: self
                .creation_date
                .as_deref()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc)),
            region: region.to_string(),
            tags: self.tags.into_iter().map(Tag::from).collect(),
            block_device_mappings: self
                .block_device_mappings
                .into_iter()
                .map(|mapping| BlockDeviceMapping {
                    device_name: mapping.device_name,
                    snapshot_id: mapping.ebs.and_then(|ebs| ebs.snapshot_id),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireBlockDeviceMapping {
    #[serde(default)]
    device_name: String,
    ebs: Option<WireEbs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireEbs {
    snapshot_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTag {
    key: String,
    #[serde(default)]
    value: String,
}

impl From<WireTag> for Tag {
    fn from(tag: WireTag) -> Self {
        Tag::new(tag.key, tag.value)
    }
}

impl From<Tag> for WireTag {
    fn from(tag: Tag) -> Self {
        WireTag {
            key: tag.key,
            value: tag.value,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSnapshotsResponse {
    #[serde(default)]
    snapshots: Vec<WireSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireSnapshot {
    snapshot_id: String,
    state: String,
    #[serde(default)]
    tags: Vec<WireTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CopyImageResponse {
    image_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeResponse {
    #[serde(default)]
    launch_permissions: Vec<WirePermission>,
    #[serde(default)]
    create_volume_permissions: Vec<WirePermission>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WirePermission {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
}

impl WirePermission {
    fn into_principal(self) -> Option<Principal> {
        match (self.user_id, self.group) {
            (Some(user_id), _) => Some(Principal::Account(user_id)),
            (None, Some(group)) => Some(Principal::Group(group)),
            (None, None) => None,
        }
    }
}

impl From<&Principal> for WirePermission {
    fn from(principal: &Principal) -> Self {
        match principal {
            Principal::Account(id) => WirePermission {
                user_id: Some(id.clone()),
                group: None,
            },
            Principal::Group(group) => WirePermission {
                user_id: None,
                group: Some(group.clone()),
            },
        }
    }
}
