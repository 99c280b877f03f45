//! Acknowledged, bidirectional channels over one-way transports.
//!
//! Two endpoints that can each push a message at the other, but share no
//! notion of a connection, run a symmetric `syn`/`ack` handshake to discover
//! each other. Application sends are held until the peer is confirmed, inbound
//! application traffic is only delivered when it comes from that peer, and a
//! send can optionally ask for a receipt.
//!
//! ```no_run
//! use postchannel::{ChannelOptions, PostChannel, adapters::loopback};
//! use serde_json::{Value, json};
//!
//! # async fn demo() -> Result<(), postchannel::ChannelError> {
//! let (left, right) = loopback::pair();
//! let a = PostChannel::<Value>::open(|_, _| {}, ChannelOptions::from_endpoint(left).instance("a"))?;
//! let b = PostChannel::<Value>::open(
//!     |me, msg| println!("{me} got {msg}"),
//!     ChannelOptions::from_endpoint(right).instance("b"),
//! )?;
//! a.ready().await;
//! a.acknowledged_send(&json!({"type": "ping"}))?.await;
//! # drop(b);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
mod ack;
mod channel;
mod config;
mod error;
mod gate;
mod handshake;
mod transport;

pub use ack::{Delivery, PendingAcks};
pub use channel::{Listener, PostChannel, create_post_channel};
pub use config::{ChannelConfig, ChannelOptions, DEFAULT_EARLY_BUFFER, DEFAULT_PERIOD, LogHook};
pub use error::{AdapterError, ChannelError, ConfigError};
pub use gate::WriteGate;
pub use handshake::Handshake;
pub use transport::{Endpoint, EventHandler, EventSource, ListenerId, PostTarget};

pub use postchannel_core::{
    CorrelationId, HandshakeState, IdGenerator, InstanceId, Message, SequentialIds,
    UuidGenerator,
};
