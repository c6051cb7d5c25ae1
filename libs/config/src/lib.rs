//! # Broker Centralized Configuration
//!
//! Configuration management and defaults for the broker service, kept in one
//! place so the server, the channel engine and the binary agree on values.
//!
//! ## Sources
//!
//! - **Defaults**: every field has a default, so an empty file is valid
//! - **TOML file**: `config/broker.toml` or a path given on the command line
//! - **Environment**: `BROKER__<SECTION>__<KEY>` overrides any file value
//!
//! ## Example
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1:1234"
//!
//! [channel]
//! buffer_size = 10000        # messages retained per channel before drop-on-full
//! message_timeout_ms = 60000 # in-flight watchdog before auto requeue
//!
//! [topics]
//! default_channels = ["default"]
//! ```

pub mod settings;
pub mod defaults;

pub use settings::{
    BrokerConfig, ChannelSettings, ConfigError, ConfigResult, IdSettings, LoggingSettings,
    ServerSettings, TopicSettings,
};
