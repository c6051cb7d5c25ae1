//! # Broker Wire Codec
//!
//! ## Purpose
//!
//! Encoding and decoding rules for the two byte-level formats the broker
//! speaks:
//!
//! - **Message frames** ([`frame`]): the binary envelope delivered to
//!   consumers, `id | topicLen | topic | msgType | payloadLen | payload`
//!   with every integer an 8-byte little-endian `i64`.
//! - **Responses** ([`response`]): every reply written to a client connection
//!   is a 4-byte big-endian length followed by that many payload bytes.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → broker (connection handler, client)
//!     ↑           ↓                  ↓
//! Message     Frame layout       Sockets
//! MsgType     Response framing   Command loop
//! ```
//!
//! ## Streaming Safety
//!
//! The async readers never assume a whole frame arrives in one transport
//! read. A frame is read in four exact stages (16-byte header, topic,
//! 16-byte sub-header, payload) and every stage accumulates partial reads
//! until the requested byte count is satisfied or the transport fails.
//!
//! ## What This Crate Does NOT Contain
//! - Socket management or connection handling
//! - Command parsing for the text protocol

pub mod error;
pub mod frame;
pub mod response;

pub use error::{CodecError, CodecResult};
pub use frame::{
    decode, encode, read_frame, Frame, DEFAULT_MAX_FIELD_LEN, FRAME_HEADER_LEN, FRAME_MIN_LEN,
};
pub use response::{read_response, write_response, RESPONSE_PREFIX_LEN};
