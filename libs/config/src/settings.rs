//! Broker Configuration Module
//!
//! Loads the broker configuration from TOML files with environment-variable
//! overrides and validates it before the service starts.

use crate::defaults;
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to load layered config: {0}")]
    Load(#[from] config_crate::ConfigError),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main broker configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub server: ServerSettings,
    pub channel: ChannelSettings,
    pub topics: TopicSettings,
    pub ids: IdSettings,
    pub logging: LoggingSettings,
}

/// Listener and connection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address of the TCP listener
    pub bind_address: String,
    /// Longest accepted command line in bytes
    pub max_command_length: usize,
    /// Upper bound for frame topic/payload lengths
    pub max_frame_field_length: usize,
}

/// Per-channel delivery engine settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Buffered messages retained before drop-on-full
    pub buffer_size: usize,
    /// In-flight watchdog duration in milliseconds
    pub message_timeout_ms: u64,
    /// Capacity of each owner-task request inbox
    pub inbox_size: usize,
}

/// Topic settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TopicSettings {
    /// Channels created together with every topic
    pub default_channels: Vec<String>,
    /// Channel used by `SUB <topic>` when no channel is named
    pub default_subscribe_channel: String,
}

/// Unique-id supplier settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IdSettings {
    /// Ids generated ahead of demand
    pub buffer_size: usize,
    /// First id handed out
    pub first_id: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: defaults::server::BIND_ADDRESS.to_string(),
            max_command_length: defaults::server::MAX_COMMAND_LENGTH,
            max_frame_field_length: defaults::server::MAX_FRAME_FIELD_LENGTH,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            buffer_size: defaults::channel::BUFFER_SIZE,
            message_timeout_ms: defaults::channel::MESSAGE_TIMEOUT_MS,
            inbox_size: defaults::channel::INBOX_SIZE,
        }
    }
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            default_channels: vec![defaults::topics::DEFAULT_CHANNEL.to_string()],
            default_subscribe_channel: defaults::topics::DEFAULT_CHANNEL.to_string(),
        }
    }
}

impl Default for IdSettings {
    fn default() -> Self {
        Self {
            buffer_size: defaults::ids::BUFFER_SIZE,
            first_id: defaults::ids::FIRST_ID,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ChannelSettings {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            ConfigError::invalid("server.bind_address", format!("{}: {}", self.bind_address, e))
        })
    }
}

impl BrokerConfig {
    /// Load configuration from a single TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file with environment overrides.
    ///
    /// Variables look like `BROKER__CHANNEL__BUFFER_SIZE=500`.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading broker config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .separator(defaults::ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(?config, "Broker configuration loaded");
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.socket_addr()?;

        if self.server.max_command_length == 0 {
            return Err(ConfigError::invalid(
                "server.max_command_length",
                "must be > 0",
            ));
        }

        if self.channel.buffer_size == 0 {
            return Err(ConfigError::invalid("channel.buffer_size", "must be > 0"));
        }

        if self.channel.inbox_size == 0 {
            return Err(ConfigError::invalid("channel.inbox_size", "must be > 0"));
        }

        if self.channel.message_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "channel.message_timeout_ms",
                "must be > 0",
            ));
        }

        if self.ids.buffer_size == 0 {
            return Err(ConfigError::invalid("ids.buffer_size", "must be > 0"));
        }

        if self.topics.default_subscribe_channel.trim().is_empty() {
            return Err(ConfigError::invalid(
                "topics.default_subscribe_channel",
                "must not be empty",
            ));
        }

        if let Some(name) = self
            .topics
            .default_channels
            .iter()
            .find(|name| name.trim().is_empty() || name.contains(char::is_whitespace))
        {
            return Err(ConfigError::invalid(
                "topics.default_channels",
                format!("invalid channel name '{}'", name),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = BrokerConfig::default();
        config.validate().unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:1234");
        assert_eq!(config.channel.message_timeout(), Duration::from_secs(60));
        assert_eq!(config.topics.default_channels, vec!["default".to_string()]);
        assert_eq!(config.ids.first_id, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BrokerConfig::from_toml_str(
            r#"
[channel]
buffer_size = 16
message_timeout_ms = 250

[logging]
json = true
"#,
        )
        .unwrap();

        assert_eq!(config.channel.buffer_size, 16);
        assert_eq!(config.channel.message_timeout(), Duration::from_millis(250));
        assert_eq!(config.channel.inbox_size, defaults::channel::INBOX_SIZE);
        assert!(config.logging.json);
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = BrokerConfig::default();
        config.channel.buffer_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "channel.buffer_size",
                ..
            })
        ));

        let mut config = BrokerConfig::default();
        config.server.bind_address = "not-an-address".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "server.bind_address",
                ..
            })
        ));

        let mut config = BrokerConfig::default();
        config.topics.default_channels = vec!["two words".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("broker.toml");

        fs::write(
            &config_path,
            r#"
[server]
bind_address = "0.0.0.0:4150"

[topics]
default_channels = ["archive", "live"]
default_subscribe_channel = "live"
"#,
        )
        .unwrap();

        let config = BrokerConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:4150");
        assert_eq!(config.topics.default_channels.len(), 2);
        assert_eq!(config.topics.default_subscribe_channel, "live");

        let same = BrokerConfig::from_file(&config_path).unwrap();
        assert_eq!(same, config);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = BrokerConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(BrokerConfig::from_toml_str(&text).unwrap(), config);
    }
}
