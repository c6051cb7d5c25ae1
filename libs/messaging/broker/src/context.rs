//! Shared broker state handed to every connection.

use broker_config::BrokerConfig;
use broker_core::{ChannelConfig, IdSupplier, TopicConfig, TopicRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BrokerContext {
    pub registry: Arc<TopicRegistry>,
    pub ids: IdSupplier,
    /// Channel used by `SUB <topic>` without an explicit channel
    pub default_channel: String,
    pub max_command_length: usize,
    /// Largest body or topic that still fits a delivery frame field
    pub max_frame_field_length: usize,
}

impl BrokerContext {
    /// Build the registry and start the id supplier. Requires a tokio runtime.
    pub fn from_config(config: &BrokerConfig) -> Self {
        let topic_config = TopicConfig {
            default_channels: config.topics.default_channels.clone(),
            channel: ChannelConfig {
                buffer_size: config.channel.buffer_size,
                message_timeout: config.channel.message_timeout(),
                inbox_size: config.channel.inbox_size,
            },
        };

        Self {
            registry: Arc::new(TopicRegistry::new(topic_config)),
            ids: IdSupplier::spawn(config.ids.first_id, config.ids.buffer_size),
            default_channel: config.topics.default_subscribe_channel.clone(),
            max_command_length: config.server.max_command_length,
            max_frame_field_length: config.server.max_frame_field_length,
        }
    }
}
