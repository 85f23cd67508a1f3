//! Value objects - immutable types that name streams and describe messages

mod message_flags;
mod topic;

pub use message_flags::MessageFlags;
pub use topic::Topic;
