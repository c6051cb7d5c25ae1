//! # Core Error Types
//!
//! Errors raised by the channel engine and the id supplier. Channel errors are
//! returned synchronously to the requesting caller; the owner task never stops
//! because of them.

use thiserror::Error;
use types::MessageId;

/// Channel operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Finish or requeue for an id that is not currently in flight
    #[error("Message {0} not in flight")]
    NotInFlight(MessageId),

    /// The channel has been closed and accepts no further requests
    #[error("Channel '{channel}' is closed")]
    Closed { channel: String },
}

/// Core infrastructure errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The background id producer is gone
    #[error("Unique id supplier stopped")]
    IdSupplierStopped,
}

/// Result type alias for channel operations
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
