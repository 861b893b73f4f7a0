//! Shared test utilities for the map render dispatch workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Style document fixtures for the probe and raster engines
//! - [`ProbeEngine`], an engine that counts parses and renders and can be
//!   made slow, failing or panicking on demand
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod probe;

pub use fixtures::*;
pub use probe::{frame_tag, framed_image, ProbeEngine, ProbeStats};

