//! Per-connection protocol state and command execution.

use super::{Command, RESPONSE_CLOSE_WAIT, RESPONSE_OK};
use crate::connection::NetworkConsumer;
use crate::context::BrokerContext;
use crate::error::{ClientError, ProtocolError};
use broker_core::{Channel, Consumer};
use bytes::Bytes;
use codec::Frame;
use std::sync::Arc;
use tracing::{debug, info};
use types::{Message, MessageId};

/// Coarse connection state gating which verbs are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// May publish or subscribe
    Fresh,
    /// Bound to one channel; may pull and settle
    Subscribed,
    /// `CLS` received; the connection ends after the reply
    Closing,
}

#[derive(Debug)]
struct Subscription {
    topic: String,
    channel: Channel,
}

/// Dispatcher for one connection
#[derive(Debug)]
pub struct Session {
    connection_id: u64,
    context: Arc<BrokerContext>,
    consumer: Arc<NetworkConsumer>,
    state: ConnectionState,
    subscription: Option<Subscription>,
}

impl Session {
    pub fn new(
        connection_id: u64,
        context: Arc<BrokerContext>,
        consumer: Arc<NetworkConsumer>,
    ) -> Self {
        Self {
            connection_id,
            context,
            consumer,
            state: ConnectionState::Fresh,
            subscription: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn max_command_length(&self) -> usize {
        self.context.max_command_length
    }

    /// Run one command, returning the success payload
    pub async fn execute(&mut self, command: Command) -> Result<Bytes, ProtocolError> {
        debug!(connection = self.connection_id, verb = command.verb(), "Executing command");

        match command {
            Command::Pub { topic, body } => self.publish(&topic, body).await,
            Command::Sub { topic, channel } => self.subscribe(&topic, channel).await,
            Command::Pull => self.pull().await,
            Command::Fin(id) => {
                self.subscribed("FIN")?.channel.finish(id).await?;
                Ok(Bytes::from_static(RESPONSE_OK))
            }
            Command::Req(id) => {
                self.subscribed("REQ")?.channel.requeue(id).await?;
                Ok(Bytes::from_static(RESPONSE_OK))
            }
            Command::Cls => {
                self.state = ConnectionState::Closing;
                Ok(Bytes::from_static(RESPONSE_CLOSE_WAIT))
            }
        }
    }

    async fn publish(&mut self, topic: &str, body: Bytes) -> Result<Bytes, ProtocolError> {
        self.require(ConnectionState::Fresh, "PUB")?;
        let limit = self.context.max_frame_field_length;
        if body.len() > limit || topic.len() > limit {
            return Err(ClientError::invalid(format!("PUB exceeds {limit} bytes")).into());
        }

        let id: MessageId = self.context.ids.next().await?;
        let message = Message::new(id, &body);
        let channels = self
            .context
            .registry
            .get_or_create(topic)
            .publish(message)
            .await;

        debug!(
            connection = self.connection_id,
            topic,
            message_id = %id,
            channels,
            "Published"
        );
        Ok(Bytes::from_static(RESPONSE_OK))
    }

    async fn subscribe(
        &mut self,
        topic: &str,
        channel: Option<String>,
    ) -> Result<Bytes, ProtocolError> {
        self.require(ConnectionState::Fresh, "SUB")?;

        let channel_name = channel.unwrap_or_else(|| self.context.default_channel.clone());
        let channel = self
            .context
            .registry
            .get_or_create(topic)
            .channel(&channel_name);
        channel
            .add_consumer(Arc::clone(&self.consumer) as Arc<dyn Consumer>)
            .await?;

        info!(
            connection = self.connection_id,
            topic,
            channel = %channel_name,
            "Subscribed"
        );
        self.subscription = Some(Subscription {
            topic: topic.to_string(),
            channel,
        });
        self.state = ConnectionState::Subscribed;
        Ok(Bytes::from_static(RESPONSE_OK))
    }

    async fn pull(&mut self) -> Result<Bytes, ProtocolError> {
        let subscription = self.subscribed("PULL")?;
        let message = subscription.channel.pull().await?;
        let frame = Frame::delivery(&message, &subscription.topic);
        Ok(codec::encode(&frame))
    }

    /// Unregister from the subscribed channel, if any
    pub async fn detach(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        let consumer = Arc::clone(&self.consumer) as Arc<dyn Consumer>;
        // A closed channel already dropped its consumers
        if let Err(e) = subscription.channel.remove_consumer(&consumer).await {
            debug!(connection = self.connection_id, error = %e, "Detach skipped");
        }
    }

    fn require(&self, state: ConnectionState, verb: &str) -> Result<(), ClientError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ClientError::invalid(format!(
                "{verb} not allowed in state {:?}",
                self.state
            )))
        }
    }

    fn subscribed(&self, verb: &str) -> Result<&Subscription, ClientError> {
        self.require(ConnectionState::Subscribed, verb)?;
        self.subscription
            .as_ref()
            .ok_or_else(|| ClientError::invalid(format!("{verb} requires SUB")))
    }
}
