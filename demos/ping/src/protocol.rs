//! Ping-specific payloads.

use serde::{Deserialize, Serialize};

/// What the two peers say to each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ping {
    Ping { seq: u32 },
    Pong { seq: u32 },
    /// The pinger is done; the answering side may hang up.
    Bye,
}
