//! # Channel - At-Least-Once Delivery Unit
//!
//! ## Purpose
//!
//! A channel holds one topic's copy of every published message and delivers
//! each to exactly one of its pullers, keeping it in flight until the puller
//! acknowledges it, requeues it, or its watchdog expires.
//!
//! ## Message Lifecycle
//!
//! ```text
//!              put                 pull                finish
//!   publish ────────▶ Buffered ──────────▶ InFlight ──────────▶ Done
//!                        │  ▲                  │
//!                  full  │  └── requeue / timeout
//!                        ▼
//!                     Dropped
//! ```
//!
//! ## Ownership
//!
//! [`Channel`] is a cheap cloneable handle. All state lives in a single owner
//! task (see `engine`), which is the only code that mutates the buffer or the
//! in-flight table. Handles talk to it over bounded inboxes and receive replies
//! on oneshot channels, so no lock is ever held around channel state.
//!
//! Buffer capacity is fixed at creation. When the buffer is full new messages
//! are dropped silently and the publisher is not told.

mod engine;
mod watchdog;

use crate::consumer::Consumer;
use crate::{ChannelError, ChannelResult};
use engine::{ChannelEngine, Inboxes};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use types::{Message, MessageId};

/// Default buffer capacity per channel
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

/// Default in-flight timeout before automatic requeue
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default depth of each request inbox
pub const DEFAULT_INBOX_SIZE: usize = 1024;

/// Channel construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Maximum buffered (not in-flight) messages
    pub buffer_size: usize,
    /// How long a message may stay in flight before it is requeued
    pub message_timeout: Duration,
    /// Depth of the publish, pull, settle and control inboxes
    pub inbox_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            inbox_size: DEFAULT_INBOX_SIZE,
        }
    }
}

/// Lifetime counters for one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Messages accepted into the buffer from publishers
    pub published: u64,
    /// Messages dropped because the buffer was full
    pub dropped: u64,
    /// Hand-offs to pullers (includes redeliveries)
    pub delivered: u64,
    pub finished: u64,
    pub requeued: u64,
    pub timed_out: u64,
}

/// Point-in-time view of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub name: String,
    /// Buffered ids in delivery order
    pub buffered: Vec<MessageId>,
    /// In-flight ids, ascending
    pub in_flight: Vec<MessageId>,
    pub consumers: usize,
    pub waiting_pullers: usize,
    pub capacity: usize,
    pub stats: ChannelStats,
}

pub(crate) enum SettleRequest {
    Finish {
        id: MessageId,
        reply: oneshot::Sender<ChannelResult<()>>,
    },
    Requeue {
        id: MessageId,
        reply: oneshot::Sender<ChannelResult<()>>,
    },
}

pub(crate) enum ControlRequest {
    AddConsumer {
        consumer: Arc<dyn Consumer>,
        reply: oneshot::Sender<()>,
    },
    RemoveConsumer {
        consumer: Arc<dyn Consumer>,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<ChannelSnapshot>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle onto a channel owner task
#[derive(Debug, Clone)]
pub struct Channel {
    name: Arc<str>,
    publish_tx: mpsc::Sender<Message>,
    pull_tx: mpsc::Sender<oneshot::Sender<Message>>,
    settle_tx: mpsc::Sender<SettleRequest>,
    control_tx: mpsc::Sender<ControlRequest>,
}

impl std::fmt::Debug for SettleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finish { id, .. } => write!(f, "Finish({id})"),
            Self::Requeue { id, .. } => write!(f, "Requeue({id})"),
        }
    }
}

impl std::fmt::Debug for ControlRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddConsumer { .. } => f.write_str("AddConsumer"),
            Self::RemoveConsumer { .. } => f.write_str("RemoveConsumer"),
            Self::Snapshot { .. } => f.write_str("Snapshot"),
            Self::Close { .. } => f.write_str("Close"),
        }
    }
}

impl Channel {
    /// Create a channel and spawn its owner task on the current runtime
    pub fn spawn(name: impl Into<String>, config: ChannelConfig) -> Self {
        let name: String = name.into();
        let inbox_size = config.inbox_size.max(1);

        let (publish_tx, publish) = mpsc::channel(inbox_size);
        let (pull_tx, pull) = mpsc::channel(inbox_size);
        let (settle_tx, settle) = mpsc::channel(inbox_size);
        let (control_tx, control) = mpsc::channel(inbox_size);

        let engine = ChannelEngine::new(name.clone(), config);
        tokio::spawn(engine.run(Inboxes {
            publish,
            pull,
            settle,
            control,
        }));

        Self {
            name: name.into(),
            publish_tx,
            pull_tx,
            settle_tx,
            control_tx,
        }
    }

    /// Handle for a channel that is shut down from the start; no task runs
    pub(crate) fn closed_from_start(name: impl Into<String>) -> Self {
        let (publish_tx, _) = mpsc::channel(1);
        let (pull_tx, _) = mpsc::channel(1);
        let (settle_tx, _) = mpsc::channel(1);
        let (control_tx, _) = mpsc::channel(1);
        let name: String = name.into();

        Self {
            name: name.into(),
            publish_tx,
            pull_tx,
            settle_tx,
            control_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the owner task has shut down
    pub fn is_closed(&self) -> bool {
        self.control_tx.is_closed()
    }

    fn closed(&self) -> ChannelError {
        ChannelError::Closed {
            channel: self.name.to_string(),
        }
    }

    /// Offer a message to the channel.
    ///
    /// Returns `false` only when the channel is closed. A full buffer drops the
    /// message inside the owner task and still counts as accepted here.
    pub async fn put(&self, message: Message) -> bool {
        match self.publish_tx.send(message).await {
            Ok(()) => true,
            Err(_) => {
                debug!(channel = %self.name, "Put on closed channel ignored");
                false
            }
        }
    }

    /// Wait for the next message; it is in flight once this returns
    pub async fn pull(&self) -> ChannelResult<Message> {
        let (tx, rx) = oneshot::channel();
        self.pull_tx.send(tx).await.map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Acknowledge an in-flight message
    pub async fn finish(&self, id: MessageId) -> ChannelResult<()> {
        let (reply, rx) = oneshot::channel();
        self.settle_tx
            .send(SettleRequest::Finish { id, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Return an in-flight message to the back of the buffer
    pub async fn requeue(&self, id: MessageId) -> ChannelResult<()> {
        let (reply, rx) = oneshot::channel();
        self.settle_tx
            .send(SettleRequest::Requeue { id, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    pub async fn add_consumer(&self, consumer: Arc<dyn Consumer>) -> ChannelResult<()> {
        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::AddConsumer { consumer, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Unregister a consumer; unknown consumers are logged and ignored
    pub async fn remove_consumer(&self, consumer: &Arc<dyn Consumer>) -> ChannelResult<()> {
        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::RemoveConsumer {
                consumer: Arc::clone(consumer),
                reply,
            })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn snapshot(&self) -> ChannelResult<ChannelSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::Snapshot { reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Shut the channel down and wait for the owner to finish.
    ///
    /// Every registered consumer is closed, parked pullers fail with
    /// [`ChannelError::Closed`], in-flight watchdogs are cancelled and held
    /// messages are discarded. Calling it again is a no-op.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .control_tx
            .send(ControlRequest::Close { reply })
            .await
            .is_err()
        {
            return;
        }
        // A dropped reply means another close won the race
        let _ = rx.await;
    }
}
