//! Mutator queue messages

use livechat_core::Topic;
use std::fmt;

use crate::connection::DataHandler;
use crate::transport::TransportEvent;

/// Work submitted by [`GatewayHandle`](super::GatewayHandle)
pub enum Command {
    Subscribe(Topic),
    Unsubscribe(Topic),
    RegisterDataHandler(Box<dyn DataHandler>),
    /// Run arbitrary work inside the mutator context
    Post(Box<dyn FnOnce() + Send>),
    Shutdown,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe(topic) => f.debug_tuple("Subscribe").field(topic).finish(),
            Self::Unsubscribe(topic) => f.debug_tuple("Unsubscribe").field(topic).finish(),
            Self::RegisterDataHandler(_) => f.write_str("RegisterDataHandler"),
            Self::Post(_) => f.write_str("Post"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Everything the mutator task processes, in arrival order
#[derive(Debug)]
pub enum MutatorMessage {
    Transport(TransportEvent),
    Command(Command),
}
