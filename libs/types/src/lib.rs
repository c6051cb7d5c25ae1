//! # Broker Types
//!
//! Shared type definitions used by every broker crate: the process-unique
//! [`MessageId`], the immutable [`Message`] that flows from publishers through
//! topics and channels to consumers, and the [`MsgType`] tag carried by wire
//! frames.
//!
//! ## Design Notes
//!
//! - **Cheap fan-out**: `Message` wraps `bytes::Bytes`, so handing the same
//!   message to every channel of a topic clones a reference count, never the
//!   payload.
//! - **Self-describing payload**: the stored payload starts with the raw
//!   8-byte id, followed by the publisher's body.
//! - **Open message types**: unknown `MsgType` values are preserved, not
//!   rejected, so frames from newer clients survive a round trip.

pub mod message;
pub mod msg_type;

pub use message::{Message, MessageId, ParseMessageIdError, MESSAGE_ID_LEN};
pub use msg_type::MsgType;
