//! # livechat-service
//!
//! Glue between the gateway and the timelines: the room registry maps each
//! room's topics to its timeline, and the dispatcher turns routed data
//! frames into timeline edits inside the gateway's mutator context.

pub mod error;
pub mod registry;
pub mod router;

pub use error::{ServiceError, ServiceResult};
pub use registry::RoomRegistry;
pub use router::{DispatchRouter, KickRoom, KickRouter, KickTopic, RoomAction, RoomDispatcher};
