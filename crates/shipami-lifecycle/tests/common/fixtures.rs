//! Test harness around the in-memory cloud

use shipami_core::{ShipamiConfig, WaitPolicy};
use shipami_ec2::mock::MockEc2Cloud;
use shipami_ec2::SessionRegistry;
use shipami_lifecycle::{CopyOptions, ImageOperator, ImageQuery};
use tracing::Span;

use super::constants::*;

/// Lifecycle components bound to one mock cloud
pub struct Harness {
    pub cloud: MockEc2Cloud,
    pub operator: ImageOperator,
    pub query: ImageQuery,
}

impl Harness {
    /// Home region `eu-west-1`, copies settle after one pending poll
    pub fn new() -> Self {
        Self::with_cloud(MockEc2Cloud::new())
    }

    pub fn with_cloud(cloud: MockEc2Cloud) -> Self {
        let config = test_config();
        let sessions = SessionRegistry::new(HOME_REGION, cloud.factory());
        Self {
            operator: ImageOperator::new(sessions.clone(), &config, Span::none()),
            query: ImageQuery::new(sessions, config.marketplace.clone(), Span::none()),
            cloud,
        }
    }

    /// Seed a source image with a root and a data device
    pub fn source_image(&self, region: &str, name: &str) -> String {
        self.cloud
            .register_image(region, name, &[ROOT_DEVICE, DATA_DEVICE])
    }

    /// Copy with default options and return the new id
    pub async fn copy(&self, image_id: &str) -> String {
        self.operator
            .copy(image_id, &CopyOptions::default())
            .await
            .expect("copy should succeed")
    }

    pub fn tag(&self, image_id: &str, key: &str) -> Option<String> {
        self.cloud
            .image(image_id)
            .and_then(|image| image.tag(key).map(str::to_string))
    }
}

/// Configuration with fast waits
pub fn test_config() -> ShipamiConfig {
    ShipamiConfig {
        region: Some(HOME_REGION.to_string()),
        wait: WaitPolicy {
            initial_delay_ms: 10,
            max_delay_ms: 50,
            backoff_multiplier: 2.0,
            timeout_secs: 60,
        },
        ..Default::default()
    }
}

/// Copy options for a cross-region copy from `region`
pub fn from_region(region: &str) -> CopyOptions {
    CopyOptions {
        source_region: Some(region.to_string()),
        ..Default::default()
    }
}
