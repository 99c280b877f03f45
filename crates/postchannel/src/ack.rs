//! Delivery receipts.
//!
//! An acknowledged send registers a waiter keyed by its correlation id. The
//! waiter completes when an `ack` carrying that id comes back. Waiters that
//! never see their ack are abandoned on disconnect: the caller's
//! [`Delivery`] stays pending rather than failing.

use postchannel_core::CorrelationId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Completes once the peer has acknowledged one message.
///
/// There is no timeout; wrap it in `tokio::time::timeout` if needed.
#[derive(Debug)]
#[must_use = "a delivery does nothing unless awaited"]
pub struct Delivery {
    id: CorrelationId,
    rx: Option<oneshot::Receiver<()>>,
}

impl Delivery {
    pub(crate) fn new(id: CorrelationId) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { id, rx: Some(rx) }, tx)
    }

    /// The correlation id carried by the message.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.id
    }
}

impl Future for Delivery {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(rx).poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(()),
            // Abandoned by disconnect.
            Poll::Ready(Err(_)) => {
                self.rx = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Outstanding receipts, owned by the channel driver.
#[derive(Debug, Default)]
pub struct PendingAcks {
    waiters: HashMap<CorrelationId, oneshot::Sender<()>>,
}

impl PendingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: CorrelationId, waiter: oneshot::Sender<()>) {
        // Drop waiters whose Delivery the caller has already let go of.
        self.waiters.retain(|_, tx| !tx.is_closed());
        self.waiters.insert(id, waiter);
    }

    /// Complete the waiter for `content`, if any. Returns whether one matched.
    pub fn resolve(&mut self, content: &str) -> bool {
        let Ok(id) = content.parse::<CorrelationId>() else {
            return false;
        };
        match self.waiters.remove(&id) {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Drop every waiter without completing it.
    pub fn abandon_all(&mut self) {
        self.waiters.clear();
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cid(s: &str) -> CorrelationId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn matching_ack_completes_delivery() {
        let mut pending = PendingAcks::new();
        let (delivery, tx) = Delivery::new(cid("m-1"));
        pending.register(cid("m-1"), tx);

        assert!(!pending.resolve("m-2"));
        assert!(pending.resolve("m-1"));
        assert!(pending.is_empty());
        delivery.await;
    }

    #[tokio::test]
    async fn abandoned_delivery_stays_pending() {
        let mut pending = PendingAcks::new();
        let (delivery, tx) = Delivery::new(cid("m-1"));
        pending.register(cid("m-1"), tx);
        pending.abandon_all();

        let waited = tokio::time::timeout(Duration::from_millis(30), delivery).await;
        assert!(waited.is_err());
    }

    #[test]
    fn dropped_deliveries_are_pruned() {
        let mut pending = PendingAcks::new();
        let (first, tx) = Delivery::new(cid("m-1"));
        pending.register(cid("m-1"), tx);
        drop(first);

        let (_second, tx) = Delivery::new(cid("m-2"));
        pending.register(cid("m-2"), tx);
        assert_eq!(pending.len(), 1);
        assert!(!pending.resolve("m-1"));
    }
}
