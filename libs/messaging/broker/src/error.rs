//! # Broker Error Types
//!
//! Two tiers of failure on a connection:
//!
//! - [`ClientError`]: the client asked for something invalid. The error code is
//!   framed back and the connection keeps serving.
//! - [`BrokerError`]: transport, codec or infrastructure failure. The affected
//!   connection ends; other connections are not touched.

use broker_config::ConfigError;
use broker_core::{ChannelError, CoreError};
use codec::CodecError;
use thiserror::Error;
use types::MessageId;

/// Error code for malformed or out-of-state commands
pub const E_INVALID: &str = "E_INVALID";
/// Error code for finish/requeue of an id that is not in flight
pub const E_NOT_IN_FLIGHT: &str = "E_NOT_IN_FLIGHT";
/// Error code for any operation on a closed channel
pub const E_CHANNEL_CLOSED: &str = "E_CHANNEL_CLOSED";

/// Recoverable per-command errors, reported to the client by code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("invalid command: {0}")]
    Invalid(String),

    #[error("message {0} not in flight")]
    NotInFlight(MessageId),

    #[error("channel closed")]
    ChannelClosed,

    /// Error code received from a server (client side only)
    #[error("server replied {0}")]
    Server(String),
}

impl ClientError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    /// Code written back on the wire
    pub fn code(&self) -> &str {
        match self {
            Self::Invalid(_) => E_INVALID,
            Self::NotInFlight(_) => E_NOT_IN_FLIGHT,
            Self::ChannelClosed => E_CHANNEL_CLOSED,
            Self::Server(code) => code,
        }
    }
}

impl From<ChannelError> for ClientError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NotInFlight(id) => Self::NotInFlight(id),
            ChannelError::Closed { .. } => Self::ChannelClosed,
        }
    }
}

/// Fatal broker errors
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Command exceeds {limit} bytes")]
    CommandTooLong { limit: usize },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Outcome of one command on the server side
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Fatal(#[from] BrokerError),
}

impl From<ChannelError> for ProtocolError {
    fn from(err: ChannelError) -> Self {
        Self::Client(err.into())
    }
}

impl From<CoreError> for ProtocolError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Channel(err) => Self::Client(err.into()),
            other => Self::Fatal(BrokerError::Core(other)),
        }
    }
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
