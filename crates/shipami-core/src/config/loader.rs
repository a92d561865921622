//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Global config (~/.shipami/config.yaml, or an explicit file)
//! 3. Environment variables (SHIPAMI_* and the standard AWS_* region/profile)
//! 4. CLI flags (handled by caller through `with_region`/`with_profile`)

use crate::error::{Error, Result};
use crate::types::WaitPolicy;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "defaults.yaml";
const GLOBAL_CONFIG_FILE: &str = "config.yaml";

/// Resolved ShipAMI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShipamiConfig {
    /// Home region: where copies land and where unqualified ids are looked up
    #[serde(default)]
    pub region: Option<String>,

    /// Named credentials profile passed to the AWS CLI
    #[serde(default)]
    pub profile: Option<String>,

    /// Marketplace distribution constants
    #[serde(default)]
    pub marketplace: MarketplaceConfig,

    /// Polling policy for image and snapshot waits
    #[serde(default)]
    pub wait: WaitPolicy,
}

/// The fixed external principal images are shared with for distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketplaceConfig {
    #[serde(default = "default_marketplace_account")]
    pub account_id: String,

    #[serde(default = "default_marketplace_region")]
    pub region: String,

    /// Alias the service reports in place of the marketplace account
    #[serde(default = "default_marketplace_alias")]
    pub alias: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            account_id: default_marketplace_account(),
            region: default_marketplace_region(),
            alias: default_marketplace_alias(),
        }
    }
}

fn default_marketplace_account() -> String {
    "679593333241".to_string()
}
fn default_marketplace_region() -> String {
    "us-east-1".to_string()
}
fn default_marketplace_alias() -> String {
    "aws-marketplace".to_string()
}

impl MarketplaceConfig {
    /// Whether `principal` designates the marketplace (account id or alias)
    pub fn is_marketplace(&self, principal: &str) -> bool {
        principal == self.account_id || principal == self.alias
    }

    /// Replace the alias with the concrete account id
    pub fn resolve_alias<'a>(&'a self, principal: &'a str) -> &'a str {
        if principal == self.alias {
            &self.account_id
        } else {
            principal
        }
    }
}

impl ShipamiConfig {
    /// Home region, required by every operation
    pub fn home_region(&self) -> Result<&str> {
        self.region.as_deref().ok_or_else(|| {
            Error::invalid_config(
                "no region configured; pass --region or set AWS_REGION / AWS_DEFAULT_REGION",
            )
        })
    }

    /// Apply a CLI `--region` flag
    pub fn with_region(mut self, region: Option<String>) -> Self {
        if region.is_some() {
            self.region = region;
        }
        self
    }

    /// Apply a CLI `--profile` flag
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        if profile.is_some() {
            self.profile = profile;
        }
        self
    }
}

/// File layer: every section optional so absent sections keep lower layers
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigOverlay {
    region: Option<String>,
    profile: Option<String>,
    marketplace: Option<MarketplaceConfig>,
    wait: Option<WaitPolicy>,
}

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Base directory for the global config file
    config_dir: Utf8PathBuf,

    /// Explicit config file (replaces the global file)
    explicit_file: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader rooted at ~/.shipami
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|_| Error::invalid_config("Home directory is not valid UTF-8"))?;

        Ok(Self::with_dir(home.join(".shipami")))
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            explicit_file: None,
        }
    }

    /// Read this file instead of the global config file
    pub fn with_file(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    /// Load configuration with hierarchical precedence
    pub fn load(&self) -> Result<ShipamiConfig> {
        let mut config = Self::load_embedded_defaults()?;

        match &self.explicit_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::invalid_config(format!(
                        "Configuration file not found: {}",
                        path
                    )));
                }
                config = Self::merge(config, Self::load_yaml_file(path)?);
            }
            None => {
                let global = self.config_dir.join(GLOBAL_CONFIG_FILE);
                if global.exists() {
                    config = Self::merge(config, Self::load_yaml_file(&global)?);
                }
            }
        }

        Self::apply_env_overrides(config)
    }

    fn load_embedded_defaults() -> Result<ShipamiConfig> {
        let embedded_file = EmbeddedConfigs::get(DEFAULTS_FILE).ok_or_else(|| {
            Error::invalid_config(format!("Embedded config not found: {}", DEFAULTS_FILE))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", DEFAULTS_FILE))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                DEFAULTS_FILE, e
            ))
        })
    }

    fn load_yaml_file(path: &Utf8Path) -> Result<ConfigOverlay> {
        debug!("Loading configuration from {}", path);
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge a file layer over the current configuration
    fn merge(base: ShipamiConfig, overlay: ConfigOverlay) -> ShipamiConfig {
        ShipamiConfig {
            region: overlay.region.or(base.region),
            profile: overlay.profile.or(base.profile),
            marketplace: overlay.marketplace.unwrap_or(base.marketplace),
            wait: overlay.wait.unwrap_or(base.wait),
        }
    }

    fn apply_env_overrides(mut config: ShipamiConfig) -> Result<ShipamiConfig> {
        // Most specific variable wins
        for var in ["AWS_DEFAULT_REGION", "AWS_REGION", "SHIPAMI_REGION"] {
            if let Some(val) = non_empty_var(var) {
                config.region = Some(val);
            }
        }

        for var in ["AWS_PROFILE", "SHIPAMI_PROFILE"] {
            if let Some(val) = non_empty_var(var) {
                config.profile = Some(val);
            }
        }

        if let Some(val) = non_empty_var("SHIPAMI_MARKETPLACE_ACCOUNT_ID") {
            config.marketplace.account_id = val;
        }

        if let Some(val) = non_empty_var("SHIPAMI_WAIT_TIMEOUT_SECS") {
            config.wait.timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("SHIPAMI_WAIT_TIMEOUT_SECS must be a valid number")
            })?;
        }

        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.trim().is_empty())
}
