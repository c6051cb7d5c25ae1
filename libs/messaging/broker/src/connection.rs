//! # Client Connection Handling
//!
//! One task per connection. The task reads one command line at a time,
//! executes it through the connection's [`Session`] and writes exactly one
//! length-prefixed response.
//!
//! ## Lifecycle
//!
//! ```text
//!   accept ──▶ read line ──▶ parse ──▶ execute ──▶ write response ─┐
//!                 ▲                                                │
//!                 └────────────── state != Closing ◀───────────────┘
//! ```
//!
//! Client errors are answered with their code and the loop continues. I/O
//! failures, an over-long command line or the channel closing this
//! connection's consumer end the loop. A client that hangs up while its
//! `PULL` is parked ends the loop too. On exit the connection removes itself
//! from its channel; anything it left unacknowledged comes back through the
//! channel's watchdog.

use crate::context::BrokerContext;
use crate::error::{BrokerError, BrokerResult, ProtocolError};
use crate::protocol::{Command, ConnectionState, Session};
use broker_core::Consumer;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Channel-side view of a subscribed connection
#[derive(Debug)]
pub struct NetworkConsumer {
    connection_id: u64,
    closed: watch::Sender<bool>,
}

impl NetworkConsumer {
    pub fn new(connection_id: u64) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            connection_id,
            closed,
        })
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Receiver that flips to `true` when the channel closes this consumer
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl Consumer for NetworkConsumer {
    fn close(&self) {
        debug!(connection = self.connection_id, "Consumer closed by channel");
        self.closed.send_replace(true);
    }
}

/// Serve one client until it closes, fails, or is closed by its channel
pub async fn handle_connection<S>(
    stream: S,
    connection_id: u64,
    context: Arc<BrokerContext>,
) -> BrokerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let consumer = NetworkConsumer::new(connection_id);
    let mut session = Session::new(connection_id, context, Arc::clone(&consumer));

    info!(connection = connection_id, "Connection opened");

    let result = command_loop(stream, &mut session, &consumer).await;

    session.detach().await;
    match &result {
        Ok(()) => info!(connection = connection_id, "Connection closed"),
        Err(e) => warn!(connection = connection_id, error = %e, "Connection failed"),
    }
    result
}

async fn command_loop<S>(
    stream: S,
    session: &mut Session,
    consumer: &NetworkConsumer,
) -> BrokerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let connection_id = consumer.connection_id();
    let max_command_length = session.max_command_length();
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(256);
    let mut closed = consumer.closed_signal();

    loop {
        let read = tokio::select! {
            read = read_command(&mut reader, &mut line, max_command_length) => read?,
            _ = closed.wait_for(|closed| *closed) => {
                info!(connection = connection_id, "Closed by channel");
                return Ok(());
            }
        };
        let Some(text) = read else {
            debug!(connection = connection_id, "Client hung up");
            return Ok(());
        };
        if text.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let outcome = match Command::parse(&text) {
            Ok(command) => {
                // Only a parked PULL can outlive its client
                let blocking = matches!(command, Command::Pull);
                tokio::select! {
                    outcome = session.execute(command) => outcome,
                    _ = closed.wait_for(|closed| *closed) => {
                        info!(connection = connection_id, "Closed by channel");
                        return Ok(());
                    }
                    gone = hung_up(&mut reader), if blocking => {
                        gone?;
                        debug!(connection = connection_id, "Client hung up while pulling");
                        return Ok(());
                    }
                }
            }
            Err(err) => Err(ProtocolError::Client(err)),
        };

        let response = match outcome {
            Ok(payload) => payload,
            Err(ProtocolError::Client(err)) => {
                warn!(connection = connection_id, error = %err, "Client error");
                Bytes::copy_from_slice(err.code().as_bytes())
            }
            Err(ProtocolError::Fatal(err)) => return Err(err),
        };
        codec::write_response(&mut writer, &response).await?;

        if session.state() == ConnectionState::Closing {
            return Ok(());
        }
    }
}

/// Resolves once the read side reaches EOF.
///
/// Bytes already sent by the client stay buffered for the next command.
async fn hung_up<R>(reader: &mut BufReader<R>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    if reader.fill_buf().await?.is_empty() {
        return Ok(());
    }
    std::future::pending().await
}

/// Read one command line without its terminator.
///
/// `Ok(None)` on clean EOF. Lines longer than `max_len` are fatal.
async fn read_command<R>(
    reader: &mut BufReader<R>,
    line: &mut Vec<u8>,
    max_len: usize,
) -> BrokerResult<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    line.clear();
    let limit = max_len as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', line).await?;
    if read == 0 {
        return Ok(None);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    if line.len() > max_len {
        return Err(BrokerError::CommandTooLong { limit: max_len });
    }

    Ok(Some(Bytes::copy_from_slice(line)))
}
