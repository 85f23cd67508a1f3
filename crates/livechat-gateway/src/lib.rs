//! # livechat-gateway
//!
//! Keeps a pool of realtime pub/sub connections alive and correctly
//! subscribed to a changing set of topics.
//!
//! - **Protocol**: frame codec trait and the Pusher codec
//! - **Connection**: per-connection state machine, heartbeat, and backoff
//! - **Manager**: topic multiplexing, rebalancing, and liveness checks
//! - **Transport**: WebSocket and in-memory connectors
//! - **Runtime**: the single mutator task and its cloneable handle

pub mod connection;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod transport;

pub use connection::{
    AssignmentView, Backoff, ConnectionId, ConnectionState, ConnectionSummary, DataHandler,
    GatewayConnection, GatewayDiag, GatewayEvent, Heartbeat, SubscriptionManager,
    SubscriptionStatus, TopicAssignment,
};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{CodecError, ControlFrame, DataFrame, DecodedFrame, FrameCodec, PusherCodec};
pub use runtime::{Command, GatewayHandle, GatewayRuntime, MutatorMessage};
pub use transport::{
    Connector, Dial, EventSink, MemoryConnector, MemoryNetwork, TransportEvent,
    TransportEventKind, TransportHandle, WsConnector,
};
