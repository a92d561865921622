//! Read-only views of owned images
//!
//! Joins the service's image listing with the lineage decoded from tags.
//! Filtering and ordering are left to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shipami_core::{
    Error, Image, ImageState, MarketplaceConfig, PermissionAttribute, Principal, Result,
};
use shipami_ec2::{Ec2Api, SessionRegistry};
use tracing::{debug, info_span, Instrument, Span};

use crate::lineage::LineageInfo;

/// One row of the image listing
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub id: String,
    pub name: String,
    pub state: ImageState,
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub lineage: LineageInfo,
}

impl ImageSummary {
    fn from_image(image: Image) -> Self {
        Self {
            lineage: LineageInfo::from_tags(&image.tags),
            id: image.id,
            name: image.name,
            state: image.state,
            creation_date: image.creation_date,
        }
    }
}

/// Full description of one image with its sharing state
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetail {
    #[serde(flatten)]
    pub image: Image,
    pub lineage: LineageInfo,
    /// Principals holding launch permission
    pub shares: Vec<Principal>,
    /// The image and every backing snapshot are shared with the marketplace
    pub marketplace_shared: bool,
}

#[derive(Debug, Clone)]
pub struct ImageQuery {
    sessions: SessionRegistry,
    marketplace: MarketplaceConfig,
    span: Span,
}

impl ImageQuery {
    pub fn new(sessions: SessionRegistry, marketplace: MarketplaceConfig, span: Span) -> Self {
        Self {
            sessions,
            marketplace,
            span,
        }
    }

    /// Every image owned in the home region
    pub async fn list(&self) -> Result<Vec<ImageSummary>> {
        let client = self.sessions.get(None);
        let images = client
            .describe_images(&[])
            .instrument(info_span!(parent: &self.span, "list", region = %client.region()))
            .await?;

        Ok(images.into_iter().map(ImageSummary::from_image).collect())
    }

    /// Describe images in input order, failing on the first unknown id
    pub async fn show(&self, image_ids: &[String]) -> Result<Vec<ImageDetail>> {
        let client = self.sessions.get(None);
        let mut details = Vec::with_capacity(image_ids.len());

        for image_id in image_ids {
            let span = info_span!(parent: &self.span, "show", image_id = %image_id);
            let detail = self
                .describe(client.as_ref(), image_id)
                .instrument(span)
                .await?;
            details.push(detail);
        }
        Ok(details)
    }

    async fn describe(&self, client: &dyn Ec2Api, image_id: &str) -> Result<ImageDetail> {
        let image = client
            .describe_images(&[image_id.to_string()])
            .await?
            .into_iter()
            .find(|image| image.id == image_id)
            .ok_or_else(|| Error::not_found(image_id))?;

        let shares = client
            .describe_permissions(image_id, PermissionAttribute::LaunchPermission)
            .await?;
        let marketplace_shared = self.is_marketplace_shared(client, &image, &shares).await?;

        Ok(ImageDetail {
            lineage: LineageInfo::from_tags(&image.tags),
            image,
            shares,
            marketplace_shared,
        })
    }

    async fn is_marketplace_shared(
        &self,
        client: &dyn Ec2Api,
        image: &Image,
        shares: &[Principal],
    ) -> Result<bool> {
        if !self.lists_marketplace(shares) {
            return Ok(false);
        }
        // mappings are incomplete until the image is available
        if image.state != ImageState::Available {
            debug!("{} is {}, not checking snapshots", image.id, image.state);
            return Ok(false);
        }

        for (device, snapshot_id) in image.snapshot_devices() {
            let permissions = client
                .describe_permissions(snapshot_id, PermissionAttribute::CreateVolumePermission)
                .await?;
            if !self.lists_marketplace(&permissions) {
                debug!("{} ({}) is not shared with the marketplace", snapshot_id, device);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn lists_marketplace(&self, principals: &[Principal]) -> bool {
        principals
            .iter()
            .filter_map(Principal::account_id)
            .any(|id| self.marketplace.is_marketplace(id))
    }
}
