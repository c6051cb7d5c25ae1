//! # Topics - Multicast Fan-Out
//!
//! ## Purpose
//!
//! A topic is a named multicast point. Publishing to a topic hands an
//! independent reference to the message to every channel the topic owns, and
//! each channel then delivers and drops on its own terms.
//!
//! ## Architecture Role
//!
//! ```mermaid
//! graph LR
//!     Pub[PUB orders body] --> Registry[TopicRegistry]
//!     Registry -->|get_or_create 'orders'| Topic[Topic 'orders']
//!     Topic -->|Message clone| Default[Channel 'default']
//!     Topic -->|Message clone| Audit[Channel 'audit']
//!
//!     subgraph "Topic"
//!         Channels[channels: DashMap<String, Channel>]
//!     end
//! ```
//!
//! Channels are created lazily on first reference and live until the topic is
//! closed. Each topic starts with the configured default channels so that
//! messages published before any subscriber arrives are retained. A channel
//! first referenced after the topic closed comes back already closed.

mod registry;

pub use registry::TopicRegistry;

use crate::channel::{Channel, ChannelConfig};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use types::Message;

/// Default channel created with every topic
pub const DEFAULT_CHANNEL: &str = "default";

/// Topic construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// Channels created together with each topic
    pub default_channels: Vec<String>,
    /// Parameters for every channel of the topic
    pub channel: ChannelConfig,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            default_channels: vec![DEFAULT_CHANNEL.to_string()],
            channel: ChannelConfig::default(),
        }
    }
}

/// Named set of channels sharing every published message
#[derive(Debug)]
pub struct Topic {
    name: String,
    channels: DashMap<String, Channel>,
    config: TopicConfig,
    closed: AtomicBool,
}

impl Topic {
    /// Create a topic with its default channels. Requires a tokio runtime.
    pub fn new(name: impl Into<String>, config: TopicConfig) -> Self {
        Self::build(name.into(), config, false)
    }

    /// Topic whose channels are all closed; no tasks are spawned
    pub(crate) fn new_closed(name: impl Into<String>, config: TopicConfig) -> Self {
        Self::build(name.into(), config, true)
    }

    fn build(name: String, config: TopicConfig, closed: bool) -> Self {
        let topic = Self {
            name,
            channels: DashMap::new(),
            closed: AtomicBool::new(closed),
            config,
        };
        for channel in &topic.config.default_channels {
            topic
                .channels
                .insert(channel.clone(), topic.spawn_channel(channel));
        }

        debug!(topic = %topic.name, channels = topic.channels.len(), closed, "Topic created");
        topic
    }

    fn spawn_channel(&self, name: &str) -> Channel {
        if self.is_closed() {
            Channel::closed_from_start(name)
        } else {
            Channel::spawn(name, self.config.channel.clone())
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get or lazily create a channel by name
    pub fn channel(&self, name: &str) -> Channel {
        if let Some(existing) = self.channels.get(name) {
            return existing.clone();
        }

        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(topic = %self.name, channel = name, "Channel created");
                // Checked under the shard lock so close() observes the insert
                self.spawn_channel(name)
            })
            .clone()
    }

    /// Handles to every channel currently owned
    pub fn channels(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Deliver a message to every channel.
    ///
    /// Returns the number of channels that accepted the message. A channel
    /// whose buffer is full still counts; it drops the message itself.
    pub async fn publish(&self, message: Message) -> usize {
        // Collect handles first so no map guard is held across an await
        let channels = self.channels();
        let accepted = join_all(channels.iter().map(|channel| channel.put(message.clone()))).await;
        let delivered = accepted.into_iter().filter(|ok| *ok).count();

        debug!(
            topic = %self.name,
            message_id = %message.id(),
            channels = delivered,
            "Message published"
        );
        delivered
    }

    /// Close every channel of the topic, including any created afterwards
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let channels = self.channels();
        join_all(channels.iter().map(Channel::close)).await;
        info!(topic = %self.name, channels = channels.len(), "Topic closed");
    }
}
