//! Identifier generation.
//!
//! Channels never reach for an ambient randomness source; they are handed an
//! [`IdGenerator`] at construction. [`UuidGenerator`] is the default.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{CorrelationId, IdError, InstanceId};

/// Source of fresh, collision-resistant identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier. Must never return an empty string.
    fn generate(&self) -> String;

    fn instance_id(&self) -> Result<InstanceId, IdError> {
        InstanceId::new(self.generate())
    }

    fn correlation_id(&self) -> Result<CorrelationId, IdError> {
        CorrelationId::new(self.generate())
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` identifiers, useful for reproducible runs.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_are_distinct() {
        let ids = UuidGenerator;
        assert_ne!(ids.generate(), ids.generate());
        assert!(!ids.generate().is_empty());
    }

    #[test]
    fn sequential_counts_up() {
        let ids = SequentialIds::new("msg");
        assert_eq!(ids.generate(), "msg-0");
        assert_eq!(ids.correlation_id().unwrap().as_str(), "msg-1");
        assert_eq!(ids.instance_id().unwrap().as_str(), "msg-2");
    }
}
