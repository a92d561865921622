//! Image and snapshot views as reported by the remote service
//!
//! These are cached copies of remote state. ShipAMI never holds authoritative
//! state; every invocation fetches a fresh view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single key/value tag
///
/// Keys are not unique in the remote model. Readers treat the first match
/// as the value (see [`find_tag`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// First value for `key` in a tag set
pub fn find_tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.key == key)
        .map(|tag| tag.value.as_str())
}

/// Image state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
    Pending,
    Available,
    Failed,
    Deregistered,
    Unknown,
}

impl ImageState {
    /// Map the service's state string
    pub fn from_service(state: &str) -> Self {
        match state {
            "pending" => ImageState::Pending,
            "available" => ImageState::Available,
            "failed" => ImageState::Failed,
            "deregistered" => ImageState::Deregistered,
            _ => ImageState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageState::Pending => "pending",
            ImageState::Available => "available",
            ImageState::Failed => "failed",
            ImageState::Deregistered => "deregistered",
            ImageState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot completion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
    Unknown,
}

impl SnapshotState {
    pub fn from_service(state: &str) -> Self {
        match state {
            "pending" => SnapshotState::Pending,
            "completed" => SnapshotState::Completed,
            "error" => SnapshotState::Error,
            _ => SnapshotState::Unknown,
        }
    }

    /// Both `completed` and `error` end a wait
    pub fn is_terminal(&self) -> bool {
        matches!(self, SnapshotState::Completed | SnapshotState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotState::Pending => "pending",
            SnapshotState::Completed => "completed",
            SnapshotState::Error => "error",
            SnapshotState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device slot of an image, optionally backed by a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub snapshot_id: Option<String>,
}

/// Image view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub state: ImageState,
    pub creation_date: Option<DateTime<Utc>>,
    pub region: String,
    pub tags: Vec<Tag>,
    /// Not guaranteed to be populated until the image is `available`
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

impl Image {
    pub fn tag(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key)
    }

    /// Device name and snapshot id of every snapshot-backed device
    pub fn snapshot_devices(&self) -> impl Iterator<Item = (&str, &str)> {
        self.block_device_mappings.iter().filter_map(|mapping| {
            mapping
                .snapshot_id
                .as_deref()
                .map(|snapshot_id| (mapping.device_name.as_str(), snapshot_id))
        })
    }
}

/// Snapshot view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub state: SnapshotState,
    pub region: String,
    pub tags: Vec<Tag>,
}

impl Snapshot {
    pub fn tag(&self, key: &str) -> Option<&str> {
        find_tag(&self.tags, key)
    }
}

/// Parameters of a cross-region image copy, issued against the destination region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyImageRequest {
    pub source_region: String,
    pub source_image_id: String,
    pub name: String,
    pub description: Option<String>,
}
