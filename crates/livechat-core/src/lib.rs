//! # livechat-core
//!
//! Value layer shared by the realtime pipeline: topics, messages, moderation
//! flags, and the snapshot cell used to publish immutable data across threads.
//! This crate has no dependency on the transport or the runtime.

pub mod entities;
pub mod error;
pub mod snapshot;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Message, MessagePtr};
pub use error::CoreError;
pub use snapshot::SnapshotCell;
pub use value_objects::{MessageFlags, Topic};
