//! Channel facade and driver.
//!
//! [`PostChannel`] is the handle callers hold. All protocol state lives in a
//! driver task that owns the handshake, the receipt table and the buffer of
//! early user messages, and reacts to four inputs in a single `select!`:
//! disconnect, inbound events, the syn timer (while unconfirmed) and queued
//! sends (once the write gate is open).

use crate::ack::{Delivery, PendingAcks};
use crate::config::{ChannelOptions, LogHook};
use crate::error::ChannelError;
use crate::gate::WriteGate;
use crate::handshake::Handshake;
use crate::transport::{EventHandler, EventSource, ListenerId, PostTarget};
use postchannel_core::{
    ControlMessage, CorrelationId, IdGenerator, Inbound, InstanceId, Message, UserMessage,
    classify,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

/// Receives each delivered application payload, along with the receiving
/// channel's own instance id.
pub type Listener<S> = Box<dyn FnMut(&InstanceId, S) + Send>;

/// A queued application send.
struct Outbound {
    content: Value,
    receipt: Option<(CorrelationId, oneshot::Sender<()>)>,
}

struct Teardown {
    source: Arc<dyn EventSource>,
    listener: ListenerId,
    shutdown: oneshot::Sender<()>,
}

/// One end of a handshaken, bidirectional channel.
///
/// `S` is the application payload type; it travels as JSON in the `content`
/// field. Dropping the handle disconnects it.
pub struct PostChannel<S = Value> {
    instance: InstanceId,
    gate: Arc<WriteGate>,
    outbound: mpsc::UnboundedSender<Outbound>,
    ids: Arc<dyn IdGenerator>,
    closed: Arc<AtomicBool>,
    teardown: Mutex<Option<Teardown>>,
    _payload: PhantomData<fn(S) -> S>,
}

impl<S> PostChannel<S>
where
    S: Serialize + DeserializeOwned + Send + 'static,
{
    /// Build a channel and start the handshake. Returns immediately; use
    /// [`ready`](Self::ready) to wait for the peer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        listener: impl FnMut(&InstanceId, S) + Send + 'static,
        options: ChannelOptions,
    ) -> Result<Self, ChannelError> {
        let instance = options.resolve_instance()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handler: EventHandler = Arc::new(move |event: Value| {
            let _ = event_tx.send(event);
        });
        let listener_id = options.from.add_event_listener(handler);

        let gate = Arc::new(WriteGate::new());
        let closed = Arc::new(AtomicBool::new(false));

        let driver = Driver {
            handshake: Handshake::new(instance.clone()),
            gate: gate.clone(),
            pending: PendingAcks::new(),
            early: VecDeque::new(),
            early_capacity: options.early_buffer,
            listener: Box::new(listener),
            to: options.to.clone(),
            log: options.log.clone(),
            closed: closed.clone(),
        };
        runtime.spawn(driver.run(options.period, event_rx, outbound_rx, shutdown_rx));

        tracing::debug!(instance = %instance, period = ?options.period, "channel opened");

        Ok(Self {
            instance,
            gate,
            outbound: outbound_tx,
            ids: options.ids.clone(),
            closed,
            teardown: Mutex::new(Some(Teardown {
                source: options.from.clone(),
                listener: listener_id,
                shutdown: shutdown_tx,
            })),
            _payload: PhantomData,
        })
    }

    /// Queue a fire-and-forget message. It is posted once the handshake has
    /// confirmed the peer, in the order sends were issued.
    pub fn send(&self, payload: &S) -> Result<(), ChannelError> {
        let content = serde_json::to_value(payload)?;
        self.enqueue(Outbound {
            content,
            receipt: None,
        });
        Ok(())
    }

    /// Queue a message that asks the peer for a receipt.
    ///
    /// The returned [`Delivery`] completes when the peer's `ack` arrives. It
    /// is never retried and never fails; after a disconnect it stays pending.
    pub fn acknowledged_send(&self, payload: &S) -> Result<Delivery, ChannelError> {
        let content = serde_json::to_value(payload)?;
        let id = self.ids.correlation_id()?;
        let (delivery, waiter) = Delivery::new(id.clone());
        self.enqueue(Outbound {
            content,
            receipt: Some((id, waiter)),
        });
        Ok(delivery)
    }
}

impl<S> PostChannel<S> {
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// The confirmed peer, once the handshake has completed.
    pub fn peer(&self) -> Option<InstanceId> {
        self.gate.peer()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }

    /// Resolves once the peer is confirmed. Never fails; never resolves if
    /// no peer ever answers.
    pub async fn ready(&self) {
        self.gate.wait().await;
    }

    /// Stop the driver and detach from the event source. Idempotent.
    ///
    /// Outstanding [`Delivery`] futures are abandoned and stay pending.
    pub fn disconnect(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(teardown) = teardown else {
            return;
        };
        self.closed.store(true, Ordering::Release);
        teardown.source.remove_event_listener(teardown.listener);
        let _ = teardown.shutdown.send(());
        tracing::debug!(instance = %self.instance, "channel disconnected");
    }

    pub fn is_disconnected(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn enqueue(&self, outbound: Outbound) {
        if self.is_disconnected() || self.outbound.send(outbound).is_err() {
            tracing::debug!(instance = %self.instance, "send after disconnect ignored");
        }
    }
}

impl<S> Drop for PostChannel<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<S> fmt::Debug for PostChannel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostChannel")
            .field("instance", &self.instance)
            .field("peer", &self.gate.peer())
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

/// Open a channel and wait until its peer is confirmed.
///
/// Hangs for as long as no peer answers; wrap in `tokio::time::timeout` to
/// bound the wait.
pub async fn create_post_channel<S>(
    listener: impl FnMut(&InstanceId, S) + Send + 'static,
    options: ChannelOptions,
) -> Result<PostChannel<S>, ChannelError>
where
    S: Serialize + DeserializeOwned + Send + 'static,
{
    let channel = PostChannel::open(listener, options)?;
    channel.ready().await;
    Ok(channel)
}

struct Driver<S> {
    handshake: Handshake,
    gate: Arc<WriteGate>,
    pending: PendingAcks,
    /// User messages that arrived before the peer was confirmed.
    early: VecDeque<UserMessage>,
    early_capacity: usize,
    listener: Listener<S>,
    to: Arc<dyn PostTarget>,
    log: Option<LogHook>,
    closed: Arc<AtomicBool>,
}

impl<S> Driver<S>
where
    S: DeserializeOwned + Send + 'static,
{
    async fn run(
        mut self,
        period: Duration,
        mut events: mpsc::UnboundedReceiver<Value>,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut syn_timer = tokio::time::interval(period);
        syn_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => break,
                },

                _ = syn_timer.tick(), if !self.handshake.state().is_confirmed() => {
                    if let Some(syn) = self.handshake.syn() {
                        self.to.post_message(&syn);
                    }
                }

                command = outbound.recv(), if self.gate.is_open() => match command {
                    Some(command) => self.post(command),
                    None => break,
                },
            }
        }

        let abandoned = self.pending.len();
        self.pending.abandon_all();
        tracing::debug!(
            instance = %self.handshake.instance(),
            abandoned,
            "channel driver stopped"
        );
    }

    fn on_event(&mut self, event: Value) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let Some(inbound) = classify(event) else {
            tracing::trace!(instance = %self.handshake.instance(), "dropping foreign event");
            return;
        };
        match inbound {
            Inbound::Control(ControlMessage::Syn(syn)) => {
                if let Some(ack) = self.handshake.on_syn(&syn) {
                    self.to.post_message(&ack);
                }
            }
            Inbound::Control(ControlMessage::Ack(ack)) => {
                if let Some(peer) = self.handshake.on_ack(&ack) {
                    self.confirm(peer);
                } else if self.pending.resolve(&ack.content) {
                    tracing::trace!(
                        instance = %self.handshake.instance(),
                        correlation_id = %ack.content,
                        "delivery acknowledged"
                    );
                }
            }
            Inbound::User(message) => {
                if self.handshake.peer().is_some() {
                    self.deliver(message);
                } else {
                    self.hold(message);
                }
            }
        }
    }

    fn confirm(&mut self, peer: InstanceId) {
        self.gate.open(peer);
        for message in std::mem::take(&mut self.early) {
            self.deliver(message);
        }
    }

    fn hold(&mut self, message: UserMessage) {
        if self.early.len() >= self.early_capacity {
            self.early.pop_front();
            tracing::warn!(
                instance = %self.handshake.instance(),
                capacity = self.early_capacity,
                "early message buffer full, dropping oldest"
            );
        }
        self.early.push_back(message);
    }

    /// Hand a user message to the listener if it came from the confirmed
    /// peer, then answer its receipt request. A payload that does not decode
    /// skips the listener but is still acknowledged.
    fn deliver(&mut self, message: UserMessage) {
        let Some(peer) = self.handshake.peer() else {
            return;
        };
        if message.sender_instance != *peer {
            tracing::trace!(
                instance = %self.handshake.instance(),
                from = %message.sender_instance,
                "dropping message from unconfirmed sender"
            );
            return;
        }
        match serde_json::from_value::<S>(message.content) {
            Ok(payload) => (self.listener)(self.handshake.instance(), payload),
            Err(e) => tracing::warn!(
                instance = %self.handshake.instance(),
                "dropping undecodable payload: {e}"
            ),
        }

        if let Some(id) = message.correlation_id {
            let ack = Message::ack(self.handshake.instance(), id.as_str());
            self.to.post_message(&ack);
        }
    }

    fn post(&mut self, command: Outbound) {
        let instance = self.handshake.instance();
        let correlation_id = match command.receipt {
            Some((id, waiter)) => {
                self.pending.register(id.clone(), waiter);
                Some(id)
            }
            None => None,
        };
        let message = Message::user(instance, command.content, correlation_id);
        self.to.post_message(&message);

        if let (Some(log), Message::User(sent)) = (&self.log, &message) {
            log(instance, &sent.content);
        }
    }
}
