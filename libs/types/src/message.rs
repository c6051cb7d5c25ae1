//! Message identifiers and the immutable message envelope.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Size of the raw id prefix stored at the front of every message payload
pub const MESSAGE_ID_LEN: usize = 8;

/// Process-unique message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Raw id bytes as stored in the message payload (little-endian)
    pub const fn to_bytes(&self) -> [u8; MESSAGE_ID_LEN] {
        self.0.to_le_bytes()
    }

    /// Signed representation used by the wire frame `id` field
    pub const fn to_wire(&self) -> i64 {
        self.0 as i64
    }

    pub const fn from_wire(raw: i64) -> Self {
        Self(raw as u64)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Failure to parse a message id from protocol text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid message id '{input}'")]
pub struct ParseMessageIdError {
    pub input: String,
}

impl FromStr for MessageId {
    type Err = ParseMessageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self).map_err(|_| ParseMessageIdError {
            input: s.to_string(),
        })
    }
}

/// Immutable message: a process-unique id plus its stored payload.
///
/// The stored payload is `id bytes ++ body`. Cloning is a reference-count
/// bump, so every channel of a topic can hold its own reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    payload: Bytes,
}

impl Message {
    /// Build the stored payload from an id and the publisher's body
    pub fn new(id: MessageId, body: impl AsRef<[u8]>) -> Self {
        let body = body.as_ref();
        let mut payload = BytesMut::with_capacity(MESSAGE_ID_LEN + body.len());
        payload.put_slice(&id.to_bytes());
        payload.put_slice(body);
        Self {
            id,
            payload: payload.freeze(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Full stored payload, including the id prefix
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Publisher body without the id prefix
    pub fn body(&self) -> Bytes {
        self.payload.slice(MESSAGE_ID_LEN..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_layout() {
        let message = Message::new(MessageId::new(7), b"hello");

        let mut expected = 7u64.to_le_bytes().to_vec();
        expected.extend_from_slice(b"hello");

        assert_eq!(message.payload().as_ref(), expected.as_slice());
        assert_eq!(message.body().as_ref(), b"hello");
        assert_eq!(message.id(), MessageId::new(7));
    }

    #[test]
    fn test_parse_message_id() {
        assert_eq!("123".parse::<MessageId>().unwrap(), MessageId::new(123));
        assert!("abc".parse::<MessageId>().is_err());
        assert!("-1".parse::<MessageId>().is_err());
    }

    #[test]
    fn test_wire_conversion() {
        let id = MessageId::new(u64::MAX);
        assert_eq!(MessageId::from_wire(id.to_wire()), id);
    }
}
