//! Wire protocol
//!
//! Backends differ only in how frames are spelled; the connection manager
//! works purely in terms of [`DecodedFrame`].

mod codec;
mod frames;
mod pusher;

pub use codec::{CodecError, FrameCodec};
pub use frames::{ControlFrame, DataFrame, DecodedFrame};
pub use pusher::PusherCodec;
