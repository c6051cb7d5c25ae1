//! # Message Frame Codec
//!
//! ## Wire Layout
//!
//! ```text
//! ┌──────────┬──────────────┬─────────────────┬────────────┬────────────────┬───────────────────┐
//! │ id (8)   │ topicLen (8) │ topic (topicLen)│ msgType (8)│ payloadLen (8) │ payload (payloadLen)│
//! └──────────┴──────────────┴─────────────────┴────────────┴────────────────┴───────────────────┘
//!   i64 LE      i64 LE          raw bytes        i64 LE        i64 LE           raw bytes
//! ```
//!
//! `msgType` is one of consumer=1, producer=2, consumer-acl=3, error=4; any
//! other value is passed through untouched.
//!
//! ## Streaming Reads
//!
//! [`read_frame`] reads the frame in four exact stages:
//! 1. 16-byte header (`id`, `topicLen`)
//! 2. exactly `topicLen` topic bytes
//! 3. 16-byte sub-header (`msgType`, `payloadLen`)
//! 4. exactly `payloadLen` payload bytes
//!
//! Each stage keeps reading until its byte count is satisfied, so frames split
//! across any number of transport reads decode identically to frames that
//! arrive in one piece. Length fields are checked against a caller-supplied
//! limit before any allocation.

use crate::{CodecError, CodecResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;
use types::{Message, MessageId, MsgType};

/// Size of the fixed header and of the sub-header (two i64 fields each)
pub const FRAME_HEADER_LEN: usize = 16;

/// Smallest possible frame: empty topic, empty payload
pub const FRAME_MIN_LEN: usize = 2 * FRAME_HEADER_LEN;

/// Default upper bound for `topicLen` and `payloadLen` (16MB)
pub const DEFAULT_MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

/// Decoded message frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: i64,
    /// Topic name as sent; the codec does not require UTF-8
    pub topic: Bytes,
    pub msg_type: MsgType,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(
        id: i64,
        topic: impl Into<Bytes>,
        msg_type: MsgType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            id,
            topic: topic.into(),
            msg_type,
            payload: payload.into(),
        }
    }

    /// Consumer delivery frame for a stored message: the body travels without
    /// its id prefix since the id already has its own field.
    pub fn delivery(message: &Message, topic: &str) -> Self {
        Self {
            id: message.id().to_wire(),
            topic: Bytes::copy_from_slice(topic.as_bytes()),
            msg_type: MsgType::Consumer,
            payload: message.body(),
        }
    }

    /// Topic as text, when it is valid UTF-8
    pub fn topic_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.topic).ok()
    }

    pub fn message_id(&self) -> MessageId {
        MessageId::from_wire(self.id)
    }

    /// Exact number of bytes [`encode`] produces for this frame
    pub fn encoded_len(&self) -> usize {
        FRAME_MIN_LEN + self.topic.len() + self.payload.len()
    }
}

/// Encode a frame into its wire representation
pub fn encode(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    buf.put_i64_le(frame.id);
    buf.put_i64_le(frame.topic.len() as i64);
    buf.put_slice(&frame.topic);
    buf.put_i64_le(frame.msg_type.as_i64());
    buf.put_i64_le(frame.payload.len() as i64);
    buf.put_slice(&frame.payload);
    buf.freeze()
}

/// Decode exactly one frame from a complete buffer
pub fn decode(bytes: &[u8]) -> CodecResult<Frame> {
    let mut cursor = bytes;

    ensure_remaining(cursor, FRAME_HEADER_LEN, Stage::Header)?;
    let id = cursor.get_i64_le();
    let topic_len = checked_len(Stage::Topic, cursor.get_i64_le(), usize::MAX)?;

    ensure_remaining(cursor, topic_len, Stage::Topic)?;
    let topic = Bytes::copy_from_slice(&cursor[..topic_len]);
    cursor.advance(topic_len);

    ensure_remaining(cursor, FRAME_HEADER_LEN, Stage::SubHeader)?;
    let msg_type = MsgType::from_i64(cursor.get_i64_le());
    let payload_len = checked_len(Stage::Payload, cursor.get_i64_le(), usize::MAX)?;

    ensure_remaining(cursor, payload_len, Stage::Payload)?;
    let payload = Bytes::copy_from_slice(&cursor[..payload_len]);
    cursor.advance(payload_len);

    if cursor.has_remaining() {
        return Err(CodecError::TrailingBytes {
            extra: cursor.remaining(),
        });
    }

    Ok(Frame {
        id,
        topic,
        msg_type,
        payload,
    })
}

/// Read one frame from a streaming transport.
///
/// Returns [`CodecError::Closed`] when the stream ends cleanly before the
/// first header byte, and [`CodecError::Truncated`] when it ends mid-frame.
pub async fn read_frame<R>(reader: &mut R, max_field_len: usize) -> CodecResult<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    read_stage(reader, &mut header, Stage::Header, true).await?;
    let mut cursor = &header[..];
    let id = cursor.get_i64_le();
    let topic_len = checked_len(Stage::Topic, cursor.get_i64_le(), max_field_len)?;

    let mut topic = BytesMut::zeroed(topic_len);
    read_stage(reader, &mut topic, Stage::Topic, false).await?;

    let mut sub_header = [0u8; FRAME_HEADER_LEN];
    read_stage(reader, &mut sub_header, Stage::SubHeader, false).await?;
    let mut cursor = &sub_header[..];
    let msg_type = MsgType::from_i64(cursor.get_i64_le());
    let payload_len = checked_len(Stage::Payload, cursor.get_i64_le(), max_field_len)?;

    let mut payload = BytesMut::zeroed(payload_len);
    read_stage(reader, &mut payload, Stage::Payload, false).await?;

    trace!(id, topic_len, payload_len, "Decoded frame");

    Ok(Frame {
        id,
        topic: topic.freeze(),
        msg_type,
        payload: payload.freeze(),
    })
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Stage {
    Header,
    Topic,
    SubHeader,
    Payload,
    ResponseLength,
    ResponsePayload,
}

impl Stage {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Stage::Header => "header",
            Stage::Topic => "topic",
            Stage::SubHeader => "sub-header",
            Stage::Payload => "payload",
            Stage::ResponseLength => "response length",
            Stage::ResponsePayload => "response payload",
        }
    }
}

/// Fill `buf` completely, accumulating partial reads.
///
/// `at_boundary` marks the first stage of a unit: EOF before any byte there
/// is a clean close rather than a truncation.
pub(crate) async fn read_stage<R>(
    reader: &mut R,
    buf: &mut [u8],
    stage: Stage,
    at_boundary: bool,
) -> CodecResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) if filled == 0 && at_boundary => return Err(CodecError::Closed),
            Ok(0) => {
                return Err(CodecError::Truncated {
                    field: stage.name(),
                    need: buf.len(),
                    got: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::io(stage.name(), e)),
        }
    }
    Ok(())
}

pub(crate) fn checked_len(stage: Stage, value: i64, limit: usize) -> CodecResult<usize> {
    if value < 0 {
        return Err(CodecError::NegativeLength {
            field: stage.name(),
            value,
        });
    }
    let len = value as u64;
    if len > limit as u64 {
        return Err(CodecError::FieldTooLarge {
            field: stage.name(),
            len,
            limit,
        });
    }
    Ok(len as usize)
}

fn ensure_remaining(cursor: &[u8], need: usize, stage: Stage) -> CodecResult<()> {
    if cursor.len() < need {
        return Err(CodecError::Truncated {
            field: stage.name(),
            need,
            got: cursor.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = Frame::new(7, "demo", MsgType::Producer, Bytes::from_static(b"hi"));
        let bytes = encode(&frame);

        assert_eq!(bytes.len(), frame.encoded_len());
        assert_eq!(&bytes[0..8], &7i64.to_le_bytes());
        assert_eq!(&bytes[8..16], &4i64.to_le_bytes());
        assert_eq!(&bytes[16..20], b"demo");
        assert_eq!(&bytes[20..28], &2i64.to_le_bytes());
        assert_eq!(&bytes[28..36], &2i64.to_le_bytes());
        assert_eq!(&bytes[36..], b"hi");
    }

    #[test]
    fn test_decode_rejects_negative_length() {
        let mut buf = BytesMut::new();
        buf.put_i64_le(1);
        buf.put_i64_le(-5);
        let err = decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            CodecError::NegativeLength {
                field: "topic",
                value: -5
            }
        ));
    }

    #[test]
    fn test_decode_truncated_and_trailing() {
        let frame = Frame::new(1, "t", MsgType::Consumer, Bytes::from_static(b"payload"));
        let bytes = encode(&frame);

        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { field: "payload", .. }));

        let mut extended = bytes.to_vec();
        extended.push(0);
        let err = decode(&extended).unwrap_err();
        assert!(matches!(err, CodecError::TrailingBytes { extra: 1 }));
    }

    #[test]
    fn test_non_utf8_topic_survives_round_trip() {
        let mut buf = BytesMut::new();
        buf.put_i64_le(1);
        buf.put_i64_le(2);
        buf.put_slice(&[0xff, 0xfe]);
        buf.put_i64_le(1);
        buf.put_i64_le(0);

        let frame = decode(&buf).unwrap();
        assert_eq!(frame.topic.as_ref(), &[0xff, 0xfe]);
        assert_eq!(frame.topic_str(), None);
        assert_eq!(encode(&frame), buf.freeze());
    }

    #[test]
    fn test_delivery_frame() {
        let message = Message::new(MessageId::new(9), b"body");
        let frame = Frame::delivery(&message, "demo");

        assert_eq!(frame.message_id(), MessageId::new(9));
        assert_eq!(frame.topic_str(), Some("demo"));
        assert_eq!(frame.msg_type, MsgType::Consumer);
        assert_eq!(frame.payload.as_ref(), b"body");
    }
}
