//! Transport capabilities.
//!
//! A channel never talks to a host primitive directly. It is handed an
//! [`EventSource`] to listen on and a [`PostTarget`] to write to; adapters
//! translate whatever the host offers into these two shapes.

use postchannel_core::Message;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callback registered on an [`EventSource`]. Receives each raw event.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Handle returned by [`EventSource::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Inbound side: something that emits raw message events.
pub trait EventSource: Send + Sync {
    fn add_event_listener(&self, handler: EventHandler) -> ListenerId;

    /// Detach a handler. Unknown ids are ignored.
    fn remove_event_listener(&self, id: ListenerId);
}

/// Outbound side: a one-way, unacknowledged send.
pub trait PostTarget: Send + Sync {
    fn post_message(&self, message: &Message);
}

/// The capability pair a channel is built from.
#[derive(Clone)]
pub struct Endpoint {
    pub from: Arc<dyn EventSource>,
    pub to: Arc<dyn PostTarget>,
}

impl Endpoint {
    pub fn new(from: Arc<dyn EventSource>, to: Arc<dyn PostTarget>) -> Self {
        Self { from, to }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").finish_non_exhaustive()
    }
}
