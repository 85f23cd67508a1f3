//! Connection pool management
//!
//! The [`SubscriptionManager`] owns every [`GatewayConnection`] and the topic
//! index; it runs only inside the mutator context.

mod backoff;
mod connection;
mod diag;
mod heartbeat;
mod manager;

pub use backoff::Backoff;
pub use connection::{ConnectionId, ConnectionState, GatewayConnection, SubscriptionStatus};
pub use diag::{AssignmentView, ConnectionSummary, GatewayDiag, GatewayEvent, TopicAssignment};
pub use heartbeat::Heartbeat;
pub use manager::{DataHandler, SubscriptionManager};
