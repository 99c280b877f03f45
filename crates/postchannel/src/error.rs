//! Error types.
//!
//! Protocol anomalies (foreign frames, unknown senders, missing acks) are
//! never errors. Only misconfiguration, unencodable payloads, and adapters
//! that cannot be built surface here.

use postchannel_core::IdError;

/// Invalid channel configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("syn period must be greater than zero")]
    ZeroPeriod,
    #[error("early message buffer must hold at least one message")]
    ZeroEarlyBuffer,
    #[error("invalid identifier: {0}")]
    Id(#[from] IdError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse channel config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Error from a channel operation.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not generate correlation id: {0}")]
    Id(#[from] IdError),
    #[error("no tokio runtime available to drive the channel")]
    NoRuntime,
}

/// Error building a transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    #[error("unknown client: {0}")]
    UnknownClient(String),
    #[error("client already joined: {0}")]
    DuplicateClient(String),
}
