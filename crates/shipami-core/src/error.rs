//! Error types for shipami-core

use std::time::Duration;
use thiserror::Error;

/// Result type alias using shipami-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for ShipAMI operations
#[derive(Error, Debug)]
pub enum Error {
    /// Any failure reported by the remote image service, message passed through verbatim
    #[error("{message}")]
    RemoteService { message: String },

    /// Delete refused without force
    #[error("{image_id} is either a release or not managed by shipami, you must use --force to delete this image")]
    ProtectedResource { image_id: String },

    /// Image name violates the length or charset rules
    #[error("Invalid image name \"{name}\": {reason}")]
    InvalidName { name: String, reason: String },

    /// Malformed lineage pointer
    #[error("Cannot parse \"{input}\": {reason}")]
    Parse { input: String, reason: String },

    /// Requested resource does not exist among owned resources
    #[error("Resource not found: {id}")]
    NotFound { id: String },

    /// A waited-on resource did not reach its target state in time
    #[error("Timed out after {}s waiting for {resource_id} to be {target}", waited.as_secs())]
    WaitTimeout {
        resource_id: String,
        target: String,
        waited: Duration,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Create a remote service error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteService {
            message: message.into(),
        }
    }

    /// Create a protected resource error
    pub fn protected(image_id: impl Into<String>) -> Self {
        Self::ProtectedResource {
            image_id: image_id.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a wait timeout error
    pub fn wait_timeout(
        resource_id: impl Into<String>,
        target: impl Into<String>,
        waited: Duration,
    ) -> Self {
        Self::WaitTimeout {
            resource_id: resource_id.into(),
            target: target.into(),
            waited,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteService { .. })
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Self::ProtectedResource { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
