//! Integration test utilities for the live chat pipeline
//!
//! Runs the real gateway runtime, registry, and timelines over the
//! in-memory transport, so tests can play the backend's side of each
//! connection.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
