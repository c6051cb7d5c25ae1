//! Client response framing: 4-byte big-endian length, then the payload.

use crate::frame::{read_stage, Stage};
use crate::{CodecError, CodecResult};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Size of the big-endian length prefix
pub const RESPONSE_PREFIX_LEN: usize = 4;

/// Write a length-prefixed response and flush.
///
/// Prefix and payload go out in a single write.
pub async fn write_response<W>(writer: &mut W, payload: &[u8]) -> CodecResult<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::FieldTooLarge {
        field: Stage::ResponsePayload.name(),
        len: payload.len() as u64,
        limit: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(RESPONSE_PREFIX_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);

    writer
        .write_all(&buf)
        .await
        .map_err(|e| CodecError::io("response write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| CodecError::io("response flush", e))
}

/// Read one length-prefixed response, rejecting payloads over `max_len`
pub async fn read_response<R>(reader: &mut R, max_len: usize) -> CodecResult<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; RESPONSE_PREFIX_LEN];
    read_stage(reader, &mut prefix, Stage::ResponseLength, true).await?;
    let len = u32::from_be_bytes(prefix) as usize;

    if len > max_len {
        return Err(CodecError::FieldTooLarge {
            field: Stage::ResponsePayload.name(),
            len: len as u64,
            limit: max_len,
        });
    }

    let mut payload = BytesMut::zeroed(len);
    read_stage(reader, &mut payload, Stage::ResponsePayload, false).await?;
    Ok(payload.freeze())
}
