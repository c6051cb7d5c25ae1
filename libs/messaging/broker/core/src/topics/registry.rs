//! Process-wide topic registry.
//!
//! The registry is an explicit value shared through `Arc` by whoever needs it
//! (server, connections, tests). Two callers racing to create the same topic
//! always observe the same instance.

use super::{Topic, TopicConfig};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: DashMap<String, Arc<Topic>>,
    config: TopicConfig,
    closed: AtomicBool,
}

impl TopicRegistry {
    pub fn new(config: TopicConfig) -> Self {
        Self {
            topics: DashMap::new(),
            config,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    /// Return the topic, creating it with its default channels on first use.
    ///
    /// After [`close_all`](Self::close_all) new topics are created closed.
    pub fn get_or_create(&self, name: &str) -> Arc<Topic> {
        if let Some(topic) = self.topics.get(name) {
            return Arc::clone(topic.value());
        }

        let topic = self
            .topics
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(topic = name, "Topic created");
                if self.closed.load(Ordering::SeqCst) {
                    Arc::new(Topic::new_closed(name, self.config.clone()))
                } else {
                    Arc::new(Topic::new(name, self.config.clone()))
                }
            });
        Arc::clone(topic.value())
    }

    /// Look up an existing topic without creating it
    pub fn get(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.get(name).map(|topic| Arc::clone(topic.value()))
    }

    /// Names of all topics, sorted
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Close every topic and its channels
    pub async fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let topics: Vec<Arc<Topic>> = self
            .topics
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        join_all(topics.iter().map(|topic| topic.close())).await;
        info!(topics = topics.len(), "All topics closed");
    }
}
