//! EC2 image service boundary for ShipAMI
//!
//! Every remote call ShipAMI makes goes through the [`Ec2Api`] trait, one
//! client per region:
//!
//! - [`AwsCliEc2`] drives the `aws ec2` command-line interface
//! - `mock::MockEc2Cloud` (feature `mock`) is an in-memory multi-region
//!   model used by tests
//! - [`SessionRegistry`] hands out one memoized client per region
//!
//! Implementations surface service failures as
//! [`shipami_core::Error::RemoteService`] (or `NotFound` for unknown ids)
//! carrying the service's own message.

pub mod aws;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod session;
pub mod traits;
mod utils;

pub use aws::AwsCliEc2;
pub use session::{ClientFactory, SessionRegistry};
pub use traits::Ec2Api;
pub use utils::check_aws_cli;
