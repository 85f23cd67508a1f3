//! Gateway error types
//!
//! Subscription bookkeeping never fails; these errors cover the transport and
//! the runtime queue only.

use thiserror::Error;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The mutator task has stopped
    #[error("Gateway runtime is not running")]
    RuntimeClosed,
}

/// Result type alias using GatewayError
pub type GatewayResult<T> = Result<T, GatewayError>;
