//! CLI command implementations

pub mod copy;
pub mod delete;
pub mod list;
pub mod release;
pub mod share;
pub mod show;

use anyhow::{bail, Result};
use shipami_core::{ConfigLoader, ShipamiConfig};
use shipami_ec2::{check_aws_cli, SessionRegistry};
use shipami_lifecycle::{ImageOperator, ImageQuery};
use tracing::{debug, info_span, Span};

use crate::cli::Cli;

/// Resolved configuration and regional sessions for one invocation
pub struct Context {
    config: ShipamiConfig,
    sessions: SessionRegistry,
    span: Span,
}

impl Context {
    /// Load configuration layers, apply CLI overrides and open the home session
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = ConfigLoader::new()?
            .with_file(cli.config.clone())
            .load()?
            .with_region(cli.region.clone())
            .with_profile(cli.profile.clone());
        let home_region = config.home_region()?.to_string();

        match check_aws_cli() {
            Some(version) => debug!("Using {}", version),
            None => bail!("aws CLI not found on PATH; install it to use shipami"),
        }

        let sessions = SessionRegistry::aws_cli(home_region.as_str(), config.profile.clone());
        let span = info_span!("shipami", region = %home_region);

        Ok(Self {
            config,
            sessions,
            span,
        })
    }

    pub fn operator(&self) -> ImageOperator {
        ImageOperator::new(self.sessions.clone(), &self.config, self.span.clone())
    }

    pub fn query(&self) -> ImageQuery {
        ImageQuery::new(
            self.sessions.clone(),
            self.config.marketplace.clone(),
            self.span.clone(),
        )
    }

    pub fn config(&self) -> &ShipamiConfig {
        &self.config
    }
}
