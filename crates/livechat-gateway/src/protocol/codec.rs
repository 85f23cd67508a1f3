//! Frame codec abstraction

use livechat_core::Topic;
use thiserror::Error;

use super::DecodedFrame;

/// Decoding errors
///
/// A frame that fails to decode is counted and dropped; it never closes the
/// connection.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid topic in frame: {0}")]
    InvalidTopic(String),
}

/// Encodes outbound and decodes inbound frames for one backend
pub trait FrameCodec: Send + 'static {
    fn encode_subscribe(&self, topic: &Topic) -> String;

    fn encode_unsubscribe(&self, topic: &Topic) -> String;

    /// Frame sent by the heartbeat check
    fn encode_liveness_probe(&self) -> String;

    /// Answer to a server-initiated probe
    fn encode_liveness_reply(&self) -> String;

    fn decode(&self, raw: &str) -> Result<DecodedFrame, CodecError>;
}
