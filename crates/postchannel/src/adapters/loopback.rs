//! In-process transport.
//!
//! A [`Mailbox`] is an event source that fans each posted value out to its
//! listeners. [`pair`] wires two mailboxes back to back, the way a worker and
//! its owner each post into the other's inbox.

use crate::transport::{Endpoint, EventHandler, EventSource, ListenerId, PostTarget};
use postchannel_core::Message;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
pub struct Mailbox {
    listeners: Mutex<BTreeMap<ListenerId, EventHandler>>,
    next_id: AtomicU64,
}

impl Mailbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a raw event to every current listener.
    ///
    /// Accepts arbitrary values, so tests and bridges can inject traffic that
    /// is not a well-formed message.
    pub fn dispatch(&self, event: Value) {
        let handlers: Vec<EventHandler> = self.lock().values().cloned().collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ListenerId, EventHandler>> {
        // Handlers never run under the lock.
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSource for Mailbox {
    fn add_event_listener(&self, handler: EventHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, handler);
        id
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.lock().remove(&id);
    }
}

/// Posts into a [`Mailbox`].
#[derive(Clone)]
pub struct MailboxTarget(pub Arc<Mailbox>);

impl PostTarget for MailboxTarget {
    fn post_message(&self, message: &Message) {
        self.0.dispatch(message.to_value());
    }
}

/// Two endpoints wired to each other: what one posts, the other hears.
pub fn pair() -> (Endpoint, Endpoint) {
    let (left, right) = pair_with_mailboxes();
    (left.endpoint, right.endpoint)
}

/// One side of [`pair_with_mailboxes`], exposing its inbox for injection.
pub struct Side {
    pub endpoint: Endpoint,
    pub inbox: Arc<Mailbox>,
}

pub fn pair_with_mailboxes() -> (Side, Side) {
    let left = Mailbox::new();
    let right = Mailbox::new();
    (
        Side {
            endpoint: Endpoint::new(left.clone(), Arc::new(MailboxTarget(right.clone()))),
            inbox: left.clone(),
        },
        Side {
            endpoint: Endpoint::new(right.clone(), Arc::new(MailboxTarget(left.clone()))),
            inbox: right,
        },
    )
}

/// An endpoint that hears its own posts.
pub fn echo() -> Endpoint {
    let mailbox = Mailbox::new();
    Endpoint::new(mailbox.clone(), Arc::new(MailboxTarget(mailbox)))
}
