//! # shipami-core
//!
//! Core library for ShipAMI providing:
//! - Image, snapshot, tag and permission types shared by every crate
//! - The error taxonomy surfaced to callers
//! - Hierarchical configuration loading (home region, marketplace, waits)

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigLoader, MarketplaceConfig, ShipamiConfig};
pub use error::{Error, Result};
pub use types::{
    find_tag, BlockDeviceMapping, CopyImageRequest, Image, ImageState, PermissionAttribute,
    PermissionOperation, Principal, Snapshot, SnapshotState, Tag, WaitPolicy,
};
