//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `blecentral.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use blecentral_adapter_btleplug::BtleplugConfig;
use blecentral_adapter_wire::codec::MAX_MESSAGE_LEN;
use blecentral_domain::gatt::NotifyPolicy;

/// Largest frame the length prefix can describe.
const MAX_FRAME_LIMIT: usize = u32::MAX as usize - 1;

/// Smallest frame that still carries a failure reply.
const MIN_FRAME_LEN: usize = 256;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Adapter selection and subscription behaviour.
    pub bluetooth: BluetoothConfig,
    /// Event bus settings.
    pub events: EventsConfig,
    /// Host bridge settings.
    pub bridge: BridgeConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Bluetooth configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Host adapter selection, flattened into this section.
    #[serde(flatten)]
    pub adapter: BtleplugConfig,
    /// Notify or indicate when a characteristic supports both.
    pub notify_policy: NotifyPolicy,
}

/// Event bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per listener before the oldest are dropped.
    pub capacity: usize,
}

/// Host bridge configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Largest accepted frame payload, in bytes.
    pub max_frame_len: usize,
}

impl Config {
    /// Load configuration from `blecentral.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("blecentral.toml")?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("BLECENTRAL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("BLECENTRAL_ADAPTER") {
            self.bluetooth.adapter.adapter_index = val
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid adapter index {val:?}")))?;
        }
        if let Some(val) = var("BLECENTRAL_NOTIFY_POLICY") {
            self.bluetooth.notify_policy = parse_notify_policy(&val)?;
        }
        if let Some(val) = var("BLECENTRAL_EVENT_CAPACITY") {
            self.events.capacity = val
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid event capacity {val:?}")))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.events.capacity == 0 {
            return Err(ConfigError::Validation(
                "event capacity must be non-zero".to_string(),
            ));
        }
        if !(MIN_FRAME_LEN..=MAX_FRAME_LIMIT).contains(&self.bridge.max_frame_len) {
            return Err(ConfigError::Validation(format!(
                "max_frame_len must be between {MIN_FRAME_LEN} and {MAX_FRAME_LIMIT}"
            )));
        }
        Ok(())
    }
}

fn parse_notify_policy(value: &str) -> Result<NotifyPolicy, ConfigError> {
    match value {
        "prefer_indicate" => Ok(NotifyPolicy::PreferIndicate),
        "prefer_notify" => Ok(NotifyPolicy::PreferNotify),
        other => Err(ConfigError::Validation(format!(
            "unknown notify policy {other:?}"
        ))),
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "blecentrald=info,blecentral=info".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_MESSAGE_LEN,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.filter, "blecentrald=info,blecentral=info");
        assert_eq!(config.bluetooth.adapter.adapter_index, 0);
        assert_eq!(config.bluetooth.notify_policy, NotifyPolicy::PreferIndicate);
        assert_eq!(config.events.capacity, 256);
        assert_eq!(config.bridge.max_frame_len, 65_536);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.events.capacity, 256);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [logging]
            filter = 'debug'

            [bluetooth]
            adapter_index = 1
            lookup_timeout_secs = 3
            notify_policy = 'prefer_notify'

            [events]
            capacity = 32

            [bridge]
            max_frame_len = 1024
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.bluetooth.adapter.adapter_index, 1);
        assert_eq!(config.bluetooth.adapter.lookup_timeout_secs, 3);
        assert_eq!(config.bluetooth.notify_policy, NotifyPolicy::PreferNotify);
        assert_eq!(config.events.capacity, 32);
        assert_eq!(config.bridge.max_frame_len, 1024);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.events.capacity, 256);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_unknown_notify_policy_in_toml() {
        let result: Result<Config, _> = toml::from_str("[bluetooth]\nnotify_policy = 'sometimes'");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("BLECENTRAL_LOG", "trace"),
                ("BLECENTRAL_ADAPTER", "2"),
                ("BLECENTRAL_NOTIFY_POLICY", "prefer_notify"),
                ("BLECENTRAL_EVENT_CAPACITY", "8"),
            ]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
        assert_eq!(config.bluetooth.adapter.adapter_index, 2);
        assert_eq!(config.bluetooth.notify_policy, NotifyPolicy::PreferNotify);
        assert_eq!(config.events.capacity, 8);
    }

    #[test]
    fn should_prefer_rust_log_over_blecentral_log() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[("BLECENTRAL_LOG", "trace"), ("RUST_LOG", "warn")]))
            .unwrap();
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_reject_invalid_adapter_override() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(env(&[("BLECENTRAL_ADAPTER", "first")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_event_capacity() {
        let mut config = Config::default();
        config.events.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_frame_length() {
        let mut config = Config::default();
        config.bridge.max_frame_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_frame_length_too_small_for_a_failure_reply() {
        let mut config = Config::default();
        config.bridge.max_frame_len = 64;
        assert!(config.validate().is_err());
        config.bridge.max_frame_len = 256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
