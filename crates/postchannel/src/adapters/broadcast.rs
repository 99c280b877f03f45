//! Hub-and-clients transport.
//!
//! One hub talks to many clients, each over its own pair of mailboxes, so a
//! hub runs one channel per client. [`BroadcastGroup::fan_out`] additionally
//! reaches every joined client at once.

use super::loopback::{Mailbox, MailboxTarget};
use crate::error::AdapterError;
use crate::transport::{Endpoint, PostTarget};
use postchannel_core::Message;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct Slot {
    /// What the hub posts, the client hears.
    to_client: Arc<Mailbox>,
    /// What the client posts, the hub hears.
    to_hub: Arc<Mailbox>,
}

#[derive(Default)]
pub struct BroadcastGroup {
    clients: Mutex<BTreeMap<String, Slot>>,
}

impl BroadcastGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a client and return its side of the link.
    pub fn join(&self, client_id: &str) -> Result<Endpoint, AdapterError> {
        let mut clients = self.lock();
        if clients.contains_key(client_id) {
            return Err(AdapterError::DuplicateClient(client_id.to_string()));
        }
        let slot = Slot {
            to_client: Mailbox::new(),
            to_hub: Mailbox::new(),
        };
        let endpoint = Endpoint::new(
            slot.to_client.clone(),
            Arc::new(MailboxTarget(slot.to_hub.clone())),
        );
        clients.insert(client_id.to_string(), slot);
        tracing::debug!(client = client_id, "client joined");
        Ok(endpoint)
    }

    /// The hub's side of the link to a joined client.
    pub fn client(&self, client_id: &str) -> Result<Endpoint, AdapterError> {
        let clients = self.lock();
        let slot = clients
            .get(client_id)
            .ok_or_else(|| AdapterError::UnknownClient(client_id.to_string()))?;
        Ok(Endpoint::new(
            slot.to_hub.clone(),
            Arc::new(MailboxTarget(slot.to_client.clone())),
        ))
    }

    /// Forget a client. Endpoints already handed out keep their mailboxes but
    /// are no longer reached by [`fan_out`](Self::fan_out).
    pub fn leave(&self, client_id: &str) -> bool {
        self.lock().remove(client_id).is_some()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// A target that posts to every client joined at the time of posting.
    pub fn fan_out(self: &Arc<Self>) -> Arc<dyn PostTarget> {
        Arc::new(FanOut(self.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Slot>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct FanOut(Arc<BroadcastGroup>);

impl PostTarget for FanOut {
    fn post_message(&self, message: &Message) {
        let inboxes: Vec<Arc<Mailbox>> = self
            .0
            .lock()
            .values()
            .map(|slot| slot.to_client.clone())
            .collect();
        let event = message.to_value();
        for inbox in inboxes {
            inbox.dispatch(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::EventHandler;
    use postchannel_core::InstanceId;
    use serde_json::Value;

    fn counter() -> (EventHandler, Arc<Mutex<usize>>) {
        let hits: Arc<Mutex<usize>> = Arc::default();
        let sink = hits.clone();
        let handler: EventHandler = Arc::new(move |_: Value| *sink.lock().unwrap() += 1);
        (handler, hits)
    }

    #[test]
    fn unknown_client_fails_immediately() {
        let group = BroadcastGroup::new();
        let err = group.client("ghost").unwrap_err();
        assert_eq!(err, AdapterError::UnknownClient("ghost".into()));
    }

    #[test]
    fn duplicate_join_fails() {
        let group = BroadcastGroup::new();
        group.join("tab-1").unwrap();
        assert_eq!(
            group.join("tab-1").unwrap_err(),
            AdapterError::DuplicateClient("tab-1".into())
        );
    }

    #[test]
    fn client_and_hub_sides_are_linked() {
        let group = BroadcastGroup::new();
        let client = group.join("tab-1").unwrap();
        let hub = group.client("tab-1").unwrap();

        let (handler, hits) = counter();
        hub.from.add_event_listener(handler);
        let id: InstanceId = "tab".parse().unwrap();
        client.to.post_message(&Message::syn(&id));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn fan_out_reaches_every_joined_client() {
        let group = BroadcastGroup::new();
        let first = group.join("tab-1").unwrap();
        let second = group.join("tab-2").unwrap();
        let gone = group.join("tab-3").unwrap();
        assert!(group.leave("tab-3"));

        let (h1, hits1) = counter();
        let (h2, hits2) = counter();
        let (h3, hits3) = counter();
        first.from.add_event_listener(h1);
        second.from.add_event_listener(h2);
        gone.from.add_event_listener(h3);

        let id: InstanceId = "hub".parse().unwrap();
        group.fan_out().post_message(&Message::syn(&id));
        assert_eq!(*hits1.lock().unwrap(), 1);
        assert_eq!(*hits2.lock().unwrap(), 1);
        assert_eq!(*hits3.lock().unwrap(), 0);
        assert_eq!(group.client_ids(), vec!["tab-1", "tab-2"]);
    }
}
