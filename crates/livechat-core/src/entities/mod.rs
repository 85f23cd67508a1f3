//! Entities - records owned by the timeline

mod message;

pub use message::{Message, MessagePtr};
