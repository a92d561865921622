//! Common test utilities for shipami-lifecycle
//!
//! Provides shared test infrastructure including:
//! - Region and account constants
//! - A harness wiring the lifecycle components to an in-memory cloud
//! - Assertion helpers for lineage tags

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod constants;
pub mod fixtures;

pub use assertions::*;
pub use constants::*;
pub use fixtures::*;
