//! Launch and create-volume permission types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A principal named in a permission list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// An account id, or an alias such as `aws-marketplace`
    Account(String),
    /// A group such as `all`
    Group(String),
}

impl Principal {
    pub fn account(id: impl Into<String>) -> Self {
        Principal::Account(id.into())
    }

    pub fn account_id(&self) -> Option<&str> {
        match self {
            Principal::Account(id) => Some(id),
            Principal::Group(_) => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Account(id) => write!(f, "{}", id),
            Principal::Group(group) => write!(f, "group:{}", group),
        }
    }
}

/// Which permission list an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionAttribute {
    /// Image launch permission
    LaunchPermission,
    /// Snapshot create-volume permission
    CreateVolumePermission,
}

impl PermissionAttribute {
    pub fn as_service_name(&self) -> &'static str {
        match self {
            PermissionAttribute::LaunchPermission => "launchPermission",
            PermissionAttribute::CreateVolumePermission => "createVolumePermission",
        }
    }
}

impl fmt::Display for PermissionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_service_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionOperation {
    Add,
    Remove,
}

impl PermissionOperation {
    pub fn from_remove_flag(remove: bool) -> Self {
        if remove {
            PermissionOperation::Remove
        } else {
            PermissionOperation::Add
        }
    }

    /// Progressive form for log lines
    pub fn verb(&self) -> &'static str {
        match self {
            PermissionOperation::Add => "adding",
            PermissionOperation::Remove => "removing",
        }
    }
}
