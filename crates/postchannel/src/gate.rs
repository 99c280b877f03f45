//! Write gate.
//!
//! A single-resolution latch over `tokio::sync::watch`. It opens at most once,
//! holding the confirmed peer id, and every waiter (before or after the
//! opening) observes that same value.

use postchannel_core::InstanceId;
use tokio::sync::watch;

#[derive(Debug)]
pub struct WriteGate {
    peer: watch::Sender<Option<InstanceId>>,
}

impl WriteGate {
    pub fn new() -> Self {
        let (peer, _) = watch::channel(None);
        Self { peer }
    }

    /// Open the gate for `peer`. Returns `false` if it was already open, in
    /// which case the first peer is kept.
    pub fn open(&self, peer: InstanceId) -> bool {
        self.peer.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(peer);
            true
        })
    }

    pub fn is_open(&self) -> bool {
        self.peer.borrow().is_some()
    }

    pub fn peer(&self) -> Option<InstanceId> {
        self.peer.borrow().clone()
    }

    /// Wait until the gate opens and return the peer it was opened for.
    ///
    /// Never resolves if the gate never opens.
    pub async fn wait(&self) -> InstanceId {
        let mut rx = self.peer.subscribe();
        let peer = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        match peer {
            Some(peer) => peer,
            None => std::future::pending().await,
        }
    }
}

impl Default for WriteGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn id(s: &str) -> InstanceId {
        s.parse().unwrap()
    }

    #[test]
    fn first_open_wins() {
        let gate = WriteGate::new();
        assert!(!gate.is_open());
        assert!(gate.open(id("b")));
        assert!(!gate.open(id("c")));
        assert_eq!(gate.peer(), Some(id("b")));
    }

    #[tokio::test]
    async fn waiters_before_and_after_see_the_same_peer() {
        let gate = Arc::new(WriteGate::new());

        let early = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::task::yield_now().await;
        gate.open(id("b"));

        assert_eq!(early.await.unwrap(), id("b"));
        assert_eq!(gate.wait().await, id("b"));
        assert_eq!(gate.wait().await, id("b"));
    }

    #[tokio::test]
    async fn closed_gate_keeps_waiting() {
        let gate = WriteGate::new();
        let waited = tokio::time::timeout(Duration::from_millis(30), gate.wait()).await;
        assert!(waited.is_err());
    }
}
