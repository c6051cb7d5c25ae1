//! Codec errors for frame and response processing
//!
//! Each variant names the field that failed so transport logs point straight
//! at the malformed part of a frame.

use thiserror::Error;

/// Frame and response codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// A length field decoded to a negative value
    #[error("Negative length in field '{field}': {value}")]
    NegativeLength { field: &'static str, value: i64 },

    /// A length field exceeds the configured maximum
    #[error("Field '{field}' too large: {len} bytes exceeds limit {limit}")]
    FieldTooLarge {
        field: &'static str,
        len: u64,
        limit: usize,
    },

    /// Buffer ended before the declared frame was complete
    #[error("Truncated frame: need {need} bytes, got {got} (while reading {field})")]
    Truncated {
        field: &'static str,
        need: usize,
        got: usize,
    },

    /// Buffer holds more bytes than the frame declares
    #[error("Trailing bytes after frame: {extra} unexpected bytes")]
    TrailingBytes { extra: usize },

    /// Peer closed the stream before the first byte of a new frame
    #[error("Connection closed")]
    Closed,

    /// Transport failure
    #[error("IO error on {field}: {source}")]
    Io {
        field: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl CodecError {
    pub(crate) fn io(field: &'static str, source: std::io::Error) -> Self {
        Self::Io { field, source }
    }
}

/// Result type alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
