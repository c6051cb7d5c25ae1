//! # Channel Owner Task
//!
//! The engine is the only code that touches a channel's state. It runs as a
//! single task and multiplexes five inboxes:
//!
//! ```text
//!   timeout  (watchdog expiries)      ─┐
//!   settle   (finish / requeue)       ─┤
//!   control  (consumers, snapshot,    ─┼──▶ ChannelEngine ──▶ waiting pullers
//!             close)                   │     buffer: VecDeque<Message>
//!   pull     (parked oneshot waiters) ─┤     in_flight: HashMap<MessageId, InFlight>
//!   publish  (put)                    ─┘
//! ```
//!
//! A message moves into flight at the moment it is handed to a puller, and
//! its watchdog is armed in the same step. Every transition out of flight
//! cancels that watchdog.

use super::watchdog::{Expired, Watchdog};
use super::{ChannelConfig, ChannelSnapshot, ChannelStats, ControlRequest, SettleRequest};
use crate::consumer::{same_consumer, Consumer};
use crate::{ChannelError, ChannelResult};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use types::{Message, MessageId};

/// Request receivers owned by the engine
pub(crate) struct Inboxes {
    pub publish: mpsc::Receiver<Message>,
    pub pull: mpsc::Receiver<oneshot::Sender<Message>>,
    pub settle: mpsc::Receiver<SettleRequest>,
    pub control: mpsc::Receiver<ControlRequest>,
}

#[derive(Debug)]
struct InFlight {
    message: Message,
    delivery: u64,
    watchdog: Watchdog,
}

pub(crate) struct ChannelEngine {
    name: String,
    config: ChannelConfig,
    buffer: VecDeque<Message>,
    in_flight: HashMap<MessageId, InFlight>,
    consumers: Vec<Arc<dyn Consumer>>,
    waiting: VecDeque<oneshot::Sender<Message>>,
    next_delivery: u64,
    stats: ChannelStats,
    expired_tx: mpsc::UnboundedSender<Expired>,
    expired_rx: mpsc::UnboundedReceiver<Expired>,
}

impl ChannelEngine {
    pub(crate) fn new(name: String, config: ChannelConfig) -> Self {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        Self {
            name,
            buffer: VecDeque::with_capacity(config.buffer_size.min(1024)),
            config,
            in_flight: HashMap::new(),
            consumers: Vec::new(),
            waiting: VecDeque::new(),
            next_delivery: 0,
            stats: ChannelStats::default(),
            expired_tx,
            expired_rx,
        }
    }

    /// Owner loop; returns once the channel has shut down
    pub(crate) async fn run(mut self, mut inboxes: Inboxes) {
        debug!(channel = %self.name, "Channel owner started");
        let mut close_reply = None;

        loop {
            tokio::select! {
                biased;

                Some(expired) = self.expired_rx.recv() => {
                    self.handle_expired(expired);
                }

                Some(request) = inboxes.settle.recv() => {
                    self.handle_settle(request);
                }

                request = inboxes.control.recv() => match request {
                    Some(ControlRequest::Close { reply }) => {
                        close_reply = Some(reply);
                        break;
                    }
                    Some(ControlRequest::Snapshot { reply }) => {
                        // A snapshot observes every put that completed before it was requested
                        self.absorb_published(&mut inboxes.publish);
                        let _ = reply.send(self.snapshot());
                    }
                    Some(request) => self.handle_control(request),
                    // Every handle dropped
                    None => break,
                },

                Some(waiter) = inboxes.pull.recv() => {
                    self.waiting.push_back(waiter);
                    self.dispatch();
                }

                Some(message) = inboxes.publish.recv() => {
                    self.enqueue(message);
                    self.dispatch();
                }
            }
        }

        self.shutdown();
        // Inboxes close before the closer is released, so later requests fail fast
        drop(inboxes);
        if let Some(reply) = close_reply {
            let _ = reply.send(());
        }
        debug!(channel = %self.name, "Channel owner stopped");
    }

    fn absorb_published(&mut self, publish: &mut mpsc::Receiver<Message>) {
        while let Ok(message) = publish.try_recv() {
            self.enqueue(message);
        }
        self.dispatch();
    }

    /// Buffer a message, dropping it when the buffer is at capacity
    pub(crate) fn enqueue(&mut self, message: Message) {
        if self.buffer.len() >= self.config.buffer_size {
            self.stats.dropped += 1;
            debug!(
                channel = %self.name,
                message_id = %message.id(),
                capacity = self.config.buffer_size,
                "Buffer full, dropping message"
            );
            return;
        }
        self.stats.published += 1;
        self.buffer.push_back(message);
    }

    /// Hand buffered messages to parked pullers in FIFO order
    pub(crate) fn dispatch(&mut self) {
        while !self.buffer.is_empty() {
            let Some(waiter) = self.waiting.pop_front() else {
                break;
            };
            if waiter.is_closed() {
                continue;
            }
            let Some(message) = self.buffer.pop_front() else {
                break;
            };
            let id = message.id();
            match waiter.send(message.clone()) {
                Ok(()) => self.start_flight(message),
                Err(message) => {
                    // Puller gave up between the check and the send
                    debug!(channel = %self.name, message_id = %id, "Puller went away, keeping message");
                    self.buffer.push_front(message);
                }
            }
        }
    }

    fn start_flight(&mut self, message: Message) {
        self.next_delivery += 1;
        let id = message.id();
        let delivery = self.next_delivery;
        let watchdog = Watchdog::arm(
            id,
            delivery,
            self.config.message_timeout,
            self.expired_tx.clone(),
        );
        self.stats.delivered += 1;

        let previous = self.in_flight.insert(
            id,
            InFlight {
                message,
                delivery,
                watchdog,
            },
        );
        if let Some(previous) = previous {
            // Same id published twice into one channel; the newer delivery wins
            warn!(channel = %self.name, message_id = %id, "Message id already in flight, replacing");
            previous.watchdog.cancel();
        }
    }

    pub(crate) fn handle_settle(&mut self, request: SettleRequest) {
        match request {
            SettleRequest::Finish { id, reply } => {
                let _ = reply.send(self.finish(id));
            }
            SettleRequest::Requeue { id, reply } => {
                let _ = reply.send(self.requeue(id));
            }
        }
    }

    pub(crate) fn finish(&mut self, id: MessageId) -> ChannelResult<()> {
        let Some(entry) = self.in_flight.remove(&id) else {
            warn!(channel = %self.name, message_id = %id, "Finish for message not in flight");
            return Err(ChannelError::NotInFlight(id));
        };
        entry.watchdog.cancel();
        self.stats.finished += 1;
        Ok(())
    }

    pub(crate) fn requeue(&mut self, id: MessageId) -> ChannelResult<()> {
        let Some(entry) = self.in_flight.remove(&id) else {
            warn!(channel = %self.name, message_id = %id, "Requeue for message not in flight");
            return Err(ChannelError::NotInFlight(id));
        };
        entry.watchdog.cancel();
        self.stats.requeued += 1;
        self.enqueue(entry.message);
        self.dispatch();
        Ok(())
    }

    pub(crate) fn handle_expired(&mut self, expired: Expired) {
        let entry = match self.in_flight.entry(expired.id) {
            Entry::Occupied(entry) if entry.get().delivery == expired.delivery => {
                entry.remove()
            }
            _ => {
                debug!(
                    channel = %self.name,
                    message_id = %expired.id,
                    delivery = expired.delivery,
                    "Ignoring stale watchdog expiry"
                );
                return;
            }
        };

        let timeout_ms =
            u64::try_from(self.config.message_timeout.as_millis()).unwrap_or(u64::MAX);
        warn!(
            channel = %self.name,
            message_id = %expired.id,
            timeout_ms,
            "auto requeue"
        );
        self.stats.timed_out += 1;
        self.enqueue(entry.message);
        self.dispatch();
    }

    fn handle_control(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::AddConsumer { consumer, reply } => {
                self.add_consumer(consumer);
                let _ = reply.send(());
            }
            ControlRequest::RemoveConsumer { consumer, reply } => {
                self.remove_consumer(&consumer);
                let _ = reply.send(());
            }
            ControlRequest::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Close is intercepted by the run loop
            ControlRequest::Close { .. } => {}
        }
    }

    pub(crate) fn add_consumer(&mut self, consumer: Arc<dyn Consumer>) {
        if self.consumers.iter().any(|c| same_consumer(c, &consumer)) {
            debug!(channel = %self.name, "Consumer already registered");
            return;
        }
        self.consumers.push(consumer);
        info!(
            channel = %self.name,
            consumers = self.consumers.len(),
            "Consumer added"
        );
    }

    pub(crate) fn remove_consumer(&mut self, consumer: &Arc<dyn Consumer>) {
        let before = self.consumers.len();
        self.consumers.retain(|c| !same_consumer(c, consumer));
        if self.consumers.len() == before {
            warn!(channel = %self.name, "Remove for unknown consumer");
            return;
        }
        info!(
            channel = %self.name,
            consumers = self.consumers.len(),
            "Consumer removed"
        );
    }

    pub(crate) fn snapshot(&self) -> ChannelSnapshot {
        let mut in_flight: Vec<MessageId> = self.in_flight.keys().copied().collect();
        in_flight.sort_unstable();
        ChannelSnapshot {
            name: self.name.clone(),
            buffered: self.buffer.iter().map(Message::id).collect(),
            in_flight,
            consumers: self.consumers.len(),
            waiting_pullers: self.waiting.iter().filter(|w| !w.is_closed()).count(),
            capacity: self.config.buffer_size,
            stats: self.stats,
        }
    }

    /// Close consumers, fail pullers and drop everything still held
    fn shutdown(&mut self) {
        for consumer in self.consumers.drain(..) {
            consumer.close();
        }

        // Dropping the reply senders fails every parked pull with Closed
        let pullers = self.waiting.len();
        self.waiting.clear();

        let in_flight = self.in_flight.len();
        for (_, entry) in self.in_flight.drain() {
            entry.watchdog.cancel();
        }

        let buffered = self.buffer.len();
        self.buffer.clear();

        info!(
            channel = %self.name,
            buffered,
            in_flight,
            pullers,
            "Channel closed"
        );
    }
}
