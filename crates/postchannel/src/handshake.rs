//! Handshake coordinator.
//!
//! ```text
//!  A                                    B
//!  |                                    |
//!  |  syn (content: A, sender: A)  =>   |
//!  |                                    |
//!  |  <=  ack (content: A, sender: B)   |
//!  |                                    |
//! ```
//!
//! Each endpoint plays both roles at once. As initiator it repeats `syn`
//! until an `ack` naming its own instance arrives, then records the ack's
//! sender as its peer. As responder it answers the first `syn` that did not
//! come from itself. Each role fires once per channel.
//!
//! This type is pure: the channel driver owns the timer and the transport and
//! executes what the coordinator returns.

use postchannel_core::{Control, HandshakeState, InstanceId, Message};

#[derive(Debug)]
pub struct Handshake {
    instance: InstanceId,
    state: HandshakeState,
    answered_syn: bool,
}

impl Handshake {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            state: HandshakeState::Unconfirmed,
            answered_syn: false,
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn peer(&self) -> Option<&InstanceId> {
        self.state.peer()
    }

    /// The probe to emit on a timer tick, or `None` once confirmed.
    pub fn syn(&self) -> Option<Message> {
        match self.state {
            HandshakeState::Unconfirmed => Some(Message::syn(&self.instance)),
            HandshakeState::Confirmed(_) => None,
        }
    }

    /// Responder role. Returns the `ack` to send for the first foreign `syn`.
    pub fn on_syn(&mut self, syn: &Control) -> Option<Message> {
        if self.answered_syn || syn.sender_instance == self.instance {
            return None;
        }
        self.answered_syn = true;
        tracing::debug!(
            instance = %self.instance,
            from = %syn.sender_instance,
            "answering syn"
        );
        Some(Message::ack(&self.instance, syn.sender_instance.as_str()))
    }

    /// Initiator role. Returns the peer when this `ack` confirms the channel.
    pub fn on_ack(&mut self, ack: &Control) -> Option<InstanceId> {
        if self.state.is_confirmed() || ack.content != self.instance.as_str() {
            return None;
        }
        let peer = ack.sender_instance.clone();
        tracing::debug!(instance = %self.instance, peer = %peer, "handshake confirmed");
        self.state = HandshakeState::Confirmed(peer.clone());
        Some(peer)
    }
}
