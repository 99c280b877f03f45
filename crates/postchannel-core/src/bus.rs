//! Inbound demultiplexing.
//!
//! Raw transport events may carry anything. [`classify`] keeps only values
//! with the wire shape and splits them into control and application traffic.
//! Everything else is not ours and is dropped without error.

use crate::message::{Control, Message, UserMessage};
use serde_json::Value;

/// Handshake and receipt traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Syn(Control),
    Ack(Control),
}

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlMessage),
    User(UserMessage),
}

impl From<Message> for Inbound {
    fn from(message: Message) -> Self {
        match message {
            Message::Syn(c) => Self::Control(ControlMessage::Syn(c)),
            Message::Ack(c) => Self::Control(ControlMessage::Ack(c)),
            Message::User(m) => Self::User(m),
        }
    }
}

/// Apply the wire-shape predicate to a raw event.
///
/// Returns `None` when the discriminant is unknown, `senderInstance` is
/// missing or not a non-empty string, or `content` is absent. Control
/// messages additionally need a string `content`, since it names an instance
/// or correlation id.
pub fn classify(raw: Value) -> Option<Inbound> {
    if !raw.is_object() {
        return None;
    }
    serde_json::from_value::<Message>(raw).ok().map(Inbound::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CorrelationId, InstanceId};
    use serde_json::json;

    fn id(s: &str) -> InstanceId {
        s.parse().unwrap()
    }

    #[test]
    fn syn_and_ack_are_control() {
        let syn = classify(json!({"kind": "syn", "senderInstance": "a", "content": "a"}));
        assert_eq!(
            syn,
            Some(Inbound::Control(ControlMessage::Syn(Control {
                sender_instance: id("a"),
                content: "a".into(),
            })))
        );

        let ack = classify(json!({"kind": "ack", "senderInstance": "b", "content": "a"}));
        assert!(matches!(ack, Some(Inbound::Control(ControlMessage::Ack(_)))));
    }

    #[test]
    fn msg_is_user_traffic() {
        let inbound = classify(json!({
            "kind": "msg",
            "senderInstance": "b",
            "content": {"type": "hello"},
            "correlationId": "c-7",
        }));
        let Some(Inbound::User(message)) = inbound else {
            panic!("expected user message, got {inbound:?}");
        };
        assert_eq!(message.sender_instance, id("b"));
        assert_eq!(message.content, json!({"type": "hello"}));
        assert_eq!(message.correlation_id, Some(CorrelationId::new("c-7").unwrap()));
    }

    #[test]
    fn null_content_still_counts_as_present() {
        let inbound = classify(json!({"kind": "msg", "senderInstance": "b", "content": null}));
        assert!(matches!(inbound, Some(Inbound::User(_))));
    }

    #[test]
    fn foreign_shapes_are_dropped() {
        let rejected = [
            json!("syn"),
            json!(null),
            json!([1, 2, 3]),
            json!({"kind": "fin", "senderInstance": "a", "content": "a"}),
            json!({"kind": "syn", "content": "a"}),
            json!({"kind": "syn", "senderInstance": 7, "content": "a"}),
            json!({"kind": "syn", "senderInstance": "", "content": "a"}),
            json!({"kind": "ack", "senderInstance": "a"}),
            json!({"kind": "ack", "senderInstance": "a", "content": {"not": "an id"}}),
            json!({"kind": "msg", "senderInstance": "a"}),
            json!({"type": "msg", "instance": "a", "content": {}}),
        ];
        for raw in rejected {
            assert_eq!(classify(raw.clone()), None, "accepted {raw}");
        }
    }

    #[test]
    fn encoded_shape_matches_wire_format() {
        let syn = Message::syn(&id("a")).to_value();
        assert_eq!(syn, json!({"kind": "syn", "senderInstance": "a", "content": "a"}));

        let plain = Message::user(&id("a"), json!({"n": 1}), None).to_value();
        assert_eq!(plain, json!({"kind": "msg", "senderInstance": "a", "content": {"n": 1}}));

        let receipted = Message::user(&id("a"), json!(1), Some(CorrelationId::new("c").unwrap()));
        assert_eq!(
            receipted.to_value(),
            json!({"kind": "msg", "senderInstance": "a", "content": 1, "correlationId": "c"})
        );
    }
}
