//! Wire messages.
//!
//! Every frame on a post-channel transport is a JSON object shaped
//! `{ kind, senderInstance, content, correlationId? }`. `syn` and `ack` are
//! control traffic; `msg` carries an application payload.

use crate::{CorrelationId, InstanceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message as it travels over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Discovery probe. `content` repeats the sender's own instance id.
    Syn(Control),
    /// Acknowledges either a peer's instance id or a correlation id.
    Ack(Control),
    /// Application traffic.
    #[serde(rename = "msg")]
    User(UserMessage),
}

/// Body shared by `syn` and `ack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub sender_instance: InstanceId,
    pub content: String,
}

/// Body of a `msg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub sender_instance: InstanceId,
    pub content: Value,
    /// Present only when the sender wants a delivery receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl Message {
    /// A `syn` announcing `instance`.
    pub fn syn(instance: &InstanceId) -> Self {
        Self::Syn(Control {
            sender_instance: instance.clone(),
            content: instance.to_string(),
        })
    }

    /// An `ack` from `instance` for `acknowledged`.
    pub fn ack(instance: &InstanceId, acknowledged: impl Into<String>) -> Self {
        Self::Ack(Control {
            sender_instance: instance.clone(),
            content: acknowledged.into(),
        })
    }

    /// A `msg` from `instance`, optionally asking for a receipt.
    pub fn user(
        instance: &InstanceId,
        content: Value,
        correlation_id: Option<CorrelationId>,
    ) -> Self {
        Self::User(UserMessage {
            sender_instance: instance.clone(),
            content,
            correlation_id,
        })
    }

    /// Encode for a transport that carries structured values.
    pub fn to_value(&self) -> Value {
        // Every field is a string or an already-built Value.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
