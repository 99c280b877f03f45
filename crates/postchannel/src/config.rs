//! Channel configuration.
//!
//! [`ChannelOptions`] is the full construction surface: transport, hooks and
//! tunables. The declarative subset lives in [`ChannelConfig`], which can be
//! loaded from TOML:
//!
//! ```toml
//! instance = "main"
//! period_ms = 25
//! early_buffer = 64
//! ```

use crate::error::ConfigError;
use crate::transport::{Endpoint, EventSource, PostTarget};
use postchannel_core::{IdGenerator, InstanceId, UuidGenerator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Syn re-emission interval when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// User messages held while the handshake is still unconfirmed.
pub const DEFAULT_EARLY_BUFFER: usize = 256;

/// Observability hook, called with every outbound application payload.
pub type LogHook = Arc<dyn Fn(&InstanceId, &Value) + Send + Sync>;

/// Serializable channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Explicit instance id; generated when absent.
    pub instance: Option<String>,
    pub period_ms: u64,
    pub early_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            instance: None,
            period_ms: DEFAULT_PERIOD.as_millis() as u64,
            early_buffer: DEFAULT_EARLY_BUFFER,
        }
    }
}

impl ChannelConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// Everything needed to construct a channel.
#[derive(Clone)]
pub struct ChannelOptions {
    pub(crate) from: Arc<dyn EventSource>,
    pub(crate) to: Arc<dyn PostTarget>,
    pub(crate) instance: Option<String>,
    pub(crate) log: Option<LogHook>,
    pub(crate) period: Duration,
    pub(crate) early_buffer: usize,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

impl ChannelOptions {
    pub fn new(from: Arc<dyn EventSource>, to: Arc<dyn PostTarget>) -> Self {
        Self {
            from,
            to,
            instance: None,
            log: None,
            period: DEFAULT_PERIOD,
            early_buffer: DEFAULT_EARLY_BUFFER,
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn from_endpoint(endpoint: Endpoint) -> Self {
        Self::new(endpoint.from, endpoint.to)
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn log(mut self, hook: impl Fn(&InstanceId, &Value) + Send + Sync + 'static) -> Self {
        self.log = Some(Arc::new(hook));
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn early_buffer(mut self, capacity: usize) -> Self {
        self.early_buffer = capacity;
        self
    }

    /// Apply the declarative settings from `config`.
    pub fn with_config(mut self, config: &ChannelConfig) -> Self {
        if let Some(instance) = &config.instance {
            self.instance = Some(instance.clone());
        }
        self.period = Duration::from_millis(config.period_ms);
        self.early_buffer = config.early_buffer;
        self
    }

    /// Check the tunables and settle the instance id.
    pub(crate) fn resolve_instance(&self) -> Result<InstanceId, ConfigError> {
        if self.period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.early_buffer == 0 {
            return Err(ConfigError::ZeroEarlyBuffer);
        }
        let instance = match &self.instance {
            Some(instance) => InstanceId::new(instance.clone())?,
            None => self.ids.instance_id()?,
        };
        Ok(instance)
    }
}

impl fmt::Debug for ChannelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelOptions")
            .field("instance", &self.instance)
            .field("period", &self.period)
            .field("early_buffer", &self.early_buffer)
            .field("log", &self.log.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::loopback;
    use postchannel_core::SequentialIds;

    fn options() -> ChannelOptions {
        let (a, _b) = loopback::pair();
        ChannelOptions::from_endpoint(a)
    }

    #[test]
    fn parse_toml() {
        let config = ChannelConfig::from_toml_str("instance = \"main\"\nperiod_ms = 25\n").unwrap();
        assert_eq!(config.instance.as_deref(), Some("main"));
        assert_eq!(config.period_ms, 25);
        assert_eq!(config.early_buffer, DEFAULT_EARLY_BUFFER);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ChannelConfig::from_toml_str("").unwrap(), ChannelConfig::default());
    }

    #[test]
    fn bad_toml_is_an_error() {
        let err = ChannelConfig::from_toml_str("period_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = options().period(Duration::ZERO).resolve_instance().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPeriod));

        let config = ChannelConfig {
            period_ms: 0,
            ..ChannelConfig::default()
        };
        let err = options().with_config(&config).resolve_instance().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPeriod));
    }

    #[test]
    fn empty_instance_is_rejected() {
        let err = options().instance("").resolve_instance().unwrap_err();
        assert!(matches!(err, ConfigError::Id(_)));
    }

    #[test]
    fn instance_is_generated_when_absent() {
        let ids = Arc::new(SequentialIds::new("node"));
        let instance = options().id_generator(ids).resolve_instance().unwrap();
        assert_eq!(instance.as_str(), "node-0");
    }
}
