//! Ready-made transports.
//!
//! These contain no protocol logic; they only shape a host primitive into an
//! [`Endpoint`](crate::Endpoint).

pub mod broadcast;
pub mod loopback;

pub use broadcast::BroadcastGroup;
pub use loopback::{Mailbox, MailboxTarget};
