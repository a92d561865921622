//! Image lifecycle for ShipAMI
//!
//! Components, leaf to root:
//! - [`tags::TagStore`]: typed tag reads and writes, multi-value append/remove
//! - [`waiter::ResourceWaiter`]: bounded polling for image and snapshot states
//! - [`lineage::LineageManager`]: the `copied_from` / `copied_to` link
//! - [`operator::ImageOperator`]: copy, release, share and delete
//! - [`query::ImageQuery`]: listing and detailed views
//!
//! Every component takes a [`tracing::Span`] at construction and logs
//! within it. All state lives in remote tags and is fetched per call.

pub mod lineage;
pub mod naming;
pub mod operator;
pub mod query;
pub mod resource;
pub mod tags;
pub mod waiter;

pub use lineage::{CopiedTo, ImagePointer, LineageInfo, LineageManager, LineageRepair};
pub use operator::{CopyOptions, ImageOperator};
pub use query::{ImageDetail, ImageQuery, ImageSummary};
pub use resource::{ImageRef, SnapshotRef, TaggedResource};
pub use tags::TagStore;
pub use waiter::ResourceWaiter;
