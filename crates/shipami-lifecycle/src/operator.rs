//! Image operator
//!
//! Orchestrates copy, release, share and delete. Each operation spans an
//! image and its backing snapshots, possibly across two regions, and is a
//! sequence of individually atomic remote calls. Nothing is rolled back: a
//! failure leaves whatever steps already ran in place.

use shipami_core::{
    CopyImageRequest, Error, ImageState, MarketplaceConfig, PermissionAttribute,
    PermissionOperation, Principal, Result, ShipamiConfig, SnapshotState, Tag,
};
use shipami_ec2::SessionRegistry;
use tracing::{debug, debug_span, info, info_span, warn, Instrument, Span};

use crate::lineage::{LineageInfo, LineageManager};
use crate::naming;
use crate::resource::{ImageRef, SnapshotRef, TaggedResource};
use crate::tags::{self, TagStore};
use crate::waiter::ResourceWaiter;

/// Options for [`ImageOperator::copy`] and [`ImageOperator::release`]
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Region holding the source image; the home region when `None`
    pub source_region: Option<String>,
    /// Name of the copy; the source name when `None`
    pub name: Option<String>,
    /// Appended to the name as `-<suffix>`
    pub name_suffix: Option<String>,
    /// Description of the copy; the source description when `None`
    pub description: Option<String>,
    pub copy_tags: bool,
    pub copy_tags_to_snapshots: bool,
    pub copy_permissions: bool,
    /// Block until the copy is available
    pub wait: bool,
    /// Replace disallowed name characters with `-`
    pub clean_name: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            source_region: None,
            name: None,
            name_suffix: None,
            description: None,
            copy_tags: true,
            copy_tags_to_snapshots: false,
            copy_permissions: false,
            wait: false,
            clean_name: true,
        }
    }
}

/// Copy, release, share and delete images
#[derive(Debug, Clone)]
pub struct ImageOperator {
    sessions: SessionRegistry,
    marketplace: MarketplaceConfig,
    tags: TagStore,
    waiter: ResourceWaiter,
    lineage: LineageManager,
    span: Span,
}

impl ImageOperator {
    pub fn new(sessions: SessionRegistry, config: &ShipamiConfig, span: Span) -> Self {
        Self {
            tags: TagStore::new(debug_span!(parent: &span, "tags")),
            waiter: ResourceWaiter::new(config.wait.clone(), debug_span!(parent: &span, "wait")),
            lineage: LineageManager::new(sessions.clone(), debug_span!(parent: &span, "lineage")),
            marketplace: config.marketplace.clone(),
            sessions,
            span,
        }
    }

    /// Copy an image into the home region, returning the new image id
    pub async fn copy(&self, image_id: &str, options: &CopyOptions) -> Result<String> {
        let span = info_span!(parent: &self.span, "copy", image_id = %image_id);
        async {
            let image = self.copy_image(image_id, options).await?;
            Ok::<_, Error>(image.id().to_string())
        }
        .instrument(span)
        .await
    }

    /// Copy an image as a named release
    ///
    /// The copy is named `<name>-<release>` and tagged `shipami:release`.
    pub async fn release(
        &self,
        image_id: &str,
        release: &str,
        options: &CopyOptions,
    ) -> Result<String> {
        let span = info_span!(parent: &self.span, "release", image_id = %image_id, release = %release);
        async {
            let options = CopyOptions {
                name_suffix: Some(release.to_string()),
                ..options.clone()
            };
            let mut image = self.copy_image(image_id, &options).await?;
            self.tags.set(&mut image, tags::RELEASE, release).await?;
            info!("Released {} as {}", image.id(), release);
            Ok::<_, Error>(image.id().to_string())
        }
        .instrument(span)
        .await
    }

    /// Grant (or revoke) launch and create-volume permission on an image
    ///
    /// Defaults to the marketplace account. The image permission is changed
    /// before any snapshot permission.
    pub async fn share(&self, image_id: &str, account_id: Option<&str>, remove: bool) -> Result<()> {
        let account_id = account_id.unwrap_or(&self.marketplace.account_id);
        let operation = PermissionOperation::from_remove_flag(remove);
        let span = info_span!(parent: &self.span, "share", image_id = %image_id, account_id = %account_id);

        async {
            let principals = [Principal::account(account_id)];
            let mut image = ImageRef::new(self.sessions.get(None), image_id);
            self.waiter
                .wait_for_image(&mut image, ImageState::Available)
                .await?;

            debug!(
                "{} launch permission for {} on {}",
                operation.verb(),
                account_id,
                image_id
            );
            image
                .client()
                .modify_permissions(
                    image_id,
                    PermissionAttribute::LaunchPermission,
                    operation,
                    &principals,
                )
                .await?;

            for (_, mut snapshot) in image.snapshots() {
                self.wait_for_completed(&mut snapshot).await?;
                debug!(
                    "{} create volume permission for {} on {}",
                    operation.verb(),
                    account_id,
                    snapshot.id()
                );
                image
                    .client()
                    .modify_permissions(
                        snapshot.id(),
                        PermissionAttribute::CreateVolumePermission,
                        operation,
                        &principals,
                    )
                    .await?;
            }

            info!("Updated permissions of {} for {}", image_id, account_id);
            Ok::<_, Error>(())
        }
        .instrument(span)
        .await
    }

    /// Deregister images and delete their snapshots, in order
    ///
    /// Unmanaged images and releases are refused unless `force` is set. A
    /// refusal aborts the batch; images deleted before it stay deleted.
    pub async fn delete(&self, image_ids: &[String], force: bool) -> Result<Vec<String>> {
        let mut deleted = Vec::with_capacity(image_ids.len());
        for image_id in image_ids {
            let span = info_span!(parent: &self.span, "delete", image_id = %image_id);
            self.delete_one(image_id, force).instrument(span).await?;
            deleted.push(image_id.clone());
        }
        Ok(deleted)
    }

    async fn copy_image(&self, image_id: &str, options: &CopyOptions) -> Result<ImageRef> {
        let mut source = ImageRef::new(
            self.sessions.get(options.source_region.as_deref()),
            image_id,
        );
        let (name, description) = {
            let detail = source.describe().await?;
            let name = naming::compose(
                options.name.as_deref().unwrap_or(&detail.name),
                options.name_suffix.as_deref(),
            );
            let description = options
                .description
                .clone()
                .or_else(|| detail.description.clone());
            (naming::validate(&name, options.clean_name)?, description)
        };

        let destination = self.sessions.get(None);
        debug!(
            "copying image {} from {} to {}",
            image_id,
            source.region(),
            destination.region()
        );
        let copy_id = destination
            .copy_image(&CopyImageRequest {
                source_region: source.region().to_string(),
                source_image_id: image_id.to_string(),
                name: name.clone(),
                description,
            })
            .await?;
        info!("Copying {} to {} as {} ({})", image_id, destination.region(), copy_id, name);

        let mut copy = ImageRef::new(destination, copy_id);
        self.lineage.link(&mut source, &mut copy).await?;

        if options.copy_tags {
            self.copy_tags(&mut source, &mut copy, options.copy_tags_to_snapshots)
                .await?;
        }

        if options.copy_permissions {
            self.copy_permissions(&mut source, &mut copy).await?;
        } else if options.wait {
            self.waiter
                .wait_for_image(&mut copy, ImageState::Available)
                .await?;
        }

        Ok(copy)
    }

    /// Write the source's tags onto the copy, then restore the copy's own lineage
    async fn copy_tags(
        &self,
        source: &mut ImageRef,
        copy: &mut ImageRef,
        to_snapshots: bool,
    ) -> Result<()> {
        debug!("copying tags from {} to {}", source.id(), copy.id());
        let source_tags = source.describe().await?.tags.clone();

        self.tags.set_many(copy, &source_tags).await?;
        self.tags.delete(copy, tags::COPIED_TO).await?;

        let clobbered = source_tags
            .iter()
            .any(|tag| tag.key == tags::MANAGED || tag.key == tags::COPIED_FROM);
        if clobbered {
            self.lineage.mark_child(copy, &source.pointer()).await?;
        }

        if to_snapshots {
            let snapshot_tags: Vec<Tag> = source_tags
                .into_iter()
                .filter(|tag| tag.key != tags::COPIED_TO)
                .collect();
            self.waiter
                .wait_for_image(copy, ImageState::Available)
                .await?;
            for (_, mut snapshot) in copy.snapshots() {
                debug!("copying tags to snapshot {}", snapshot.id());
                self.tags.set_many(&mut snapshot, &snapshot_tags).await?;
            }
        }
        Ok(())
    }

    /// Mirror launch and create-volume permissions from source to copy
    async fn copy_permissions(&self, source: &mut ImageRef, copy: &mut ImageRef) -> Result<()> {
        self.waiter
            .wait_for_image(copy, ImageState::Available)
            .await?;

        let launch = source
            .client()
            .describe_permissions(source.id(), PermissionAttribute::LaunchPermission)
            .await?;
        let launch: Vec<Principal> = launch
            .into_iter()
            .map(|principal| self.resolve_marketplace(principal))
            .collect();
        if !launch.is_empty() {
            debug!("adding launch permission for {:?} on {}", launch, copy.id());
            copy.client()
                .modify_permissions(
                    copy.id(),
                    PermissionAttribute::LaunchPermission,
                    PermissionOperation::Add,
                    &launch,
                )
                .await?;
        }

        let source_devices = {
            source.describe().await?;
            source.snapshots()
        };
        for (device, mut snapshot) in copy.snapshots() {
            self.wait_for_completed(&mut snapshot).await?;

            let Some((_, source_snapshot)) = source_devices.iter().find(|(name, _)| *name == device)
            else {
                debug!("no source snapshot for device {} of {}", device, copy.id());
                continue;
            };
            debug!(
                "found matching device {} for {} and {}",
                device,
                source_snapshot.id(),
                snapshot.id()
            );

            let volume: Vec<Principal> = source
                .client()
                .describe_permissions(
                    source_snapshot.id(),
                    PermissionAttribute::CreateVolumePermission,
                )
                .await?
                .into_iter()
                .map(|principal| self.resolve_marketplace(principal))
                .collect();
            if volume.is_empty() {
                continue;
            }
            copy.client()
                .modify_permissions(
                    snapshot.id(),
                    PermissionAttribute::CreateVolumePermission,
                    PermissionOperation::Add,
                    &volume,
                )
                .await?;
        }
        Ok(())
    }

    async fn delete_one(&self, image_id: &str, force: bool) -> Result<()> {
        let client = self.sessions.get(None);
        let mut image = ImageRef::new(client.clone(), image_id);
        let info = LineageInfo::from_tags(&image.describe().await?.tags);

        if info.is_protected() && !force {
            return Err(Error::protected(image_id));
        }

        let mut parent = if info.managed {
            info.copied_from
                .as_ref()
                .map(|pointer| self.lineage.resolve_pointer(pointer))
        } else {
            None
        };

        self.waiter.wait_until_settled(&mut image).await?;
        let snapshots = image.snapshots();

        debug!("deregistering {}", image_id);
        client.deregister_image(image_id).await?;
        for (_, snapshot) in &snapshots {
            debug!("deleting snapshot {}", snapshot.id());
            client.delete_snapshot(snapshot.id()).await?;
        }

        if let Some(parent) = parent.as_mut() {
            self.lineage
                .unlink_as_parent(parent, &image.pointer())
                .await;
        }
        for child in info.copied_to.iter() {
            warn!(
                "{} is deleted but {} still names it in {}",
                image_id,
                child,
                tags::COPIED_FROM
            );
        }

        info!("Deleted {} and {} snapshot(s)", image_id, snapshots.len());
        Ok(())
    }

    /// Wait for a snapshot and require it to have completed
    async fn wait_for_completed(&self, snapshot: &mut SnapshotRef) -> Result<()> {
        match self.waiter.wait_for_snapshot(snapshot).await? {
            SnapshotState::Error => Err(Error::remote(format!(
                "Snapshot {} entered state error",
                snapshot.id()
            ))),
            _ => Ok(()),
        }
    }

    fn resolve_marketplace(&self, principal: Principal) -> Principal {
        match principal {
            Principal::Account(id) => {
                Principal::Account(self.marketplace.resolve_alias(&id).to_string())
            }
            group => group,
        }
    }
}
