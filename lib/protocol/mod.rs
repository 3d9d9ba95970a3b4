//! Wire protocol spoken with remote peers.

pub mod framing;
pub mod message;

pub use framing::{FrameBuffer, Push};
pub use message::{Inbound, Outbound, ProtocolError, READ_ERROR_PREFIX};
