//! Type definitions for ShipAMI

mod permission;
mod resource;
mod wait_policy;

pub use permission::{PermissionAttribute, PermissionOperation, Principal};
pub use resource::{
    find_tag, BlockDeviceMapping, CopyImageRequest, Image, ImageState, Snapshot, SnapshotState,
    Tag,
};
pub use wait_policy::WaitPolicy;
