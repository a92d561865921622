//! Configuration loading and management

mod loader;

pub use loader::{ConfigLoader, MarketplaceConfig, ShipamiConfig};
