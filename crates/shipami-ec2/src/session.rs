//! Per-region client cache

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::aws::AwsCliEc2;
use crate::traits::Ec2Api;

/// Builds the client for a region
pub type ClientFactory = Arc<dyn Fn(&str) -> Arc<dyn Ec2Api> + Send + Sync>;

/// Memoized region → client map
///
/// Clients are created lazily on first use and live as long as the registry.
/// Insertion goes through `DashMap::entry`, so two tasks asking for a new
/// region at once still share a single client.
#[derive(Clone)]
pub struct SessionRegistry {
    home_region: String,
    factory: ClientFactory,
    sessions: Arc<DashMap<String, Arc<dyn Ec2Api>>>,
}

impl SessionRegistry {
    pub fn new(home_region: impl Into<String>, factory: ClientFactory) -> Self {
        Self {
            home_region: home_region.into(),
            factory,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Registry of AWS CLI clients sharing one profile
    pub fn aws_cli(home_region: impl Into<String>, profile: Option<String>) -> Self {
        let factory: ClientFactory = Arc::new(move |region: &str| {
            Arc::new(AwsCliEc2::new(region, profile.clone())) as Arc<dyn Ec2Api>
        });
        Self::new(home_region, factory)
    }

    /// Client for `region`, or for the home region when `None`
    pub fn get(&self, region: Option<&str>) -> Arc<dyn Ec2Api> {
        let region = region.unwrap_or(&self.home_region);
        self.sessions
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!("Opening session for region {}", region);
                (self.factory)(region)
            })
            .value()
            .clone()
    }

    /// Number of regions with an open session
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("home_region", &self.home_region)
            .field("regions", &self.sessions.len())
            .finish()
    }
}
