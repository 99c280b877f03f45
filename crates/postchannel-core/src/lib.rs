//! Core types for post-channel.
//!
//! This crate provides the wire format and identifiers shared by every
//! endpoint. The handshake runtime lives in `postchannel`; transports only
//! need this crate to encode and decode frames.

mod bus;
mod id;
mod instance;
mod message;

pub use bus::{ControlMessage, Inbound, classify};
pub use id::{IdGenerator, SequentialIds, UuidGenerator};
pub use instance::{CorrelationId, IdError, InstanceId};
pub use message::{Control, Message, UserMessage};

/// Handshake progress of one channel endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Still emitting `syn`, no peer known.
    Unconfirmed,
    /// The peer acknowledged our `syn`. Terminal.
    Confirmed(InstanceId),
}

impl HandshakeState {
    pub fn peer(&self) -> Option<&InstanceId> {
        match self {
            Self::Unconfirmed => None,
            Self::Confirmed(peer) => Some(peer),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}
