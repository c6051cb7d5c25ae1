//! Message type tag carried in the wire frame.

use serde::{Deserialize, Serialize};

/// Frame message type.
///
/// Values outside the known set are kept as [`MsgType::Unknown`] so they
/// survive decoding and re-encoding unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgType {
    Consumer,
    Producer,
    /// Placeholder tag for consumer access control; carries no enforcement
    ConsumerAcl,
    Error,
    Unknown(i64),
}

impl MsgType {
    pub const fn as_i64(&self) -> i64 {
        match self {
            MsgType::Consumer => 1,
            MsgType::Producer => 2,
            MsgType::ConsumerAcl => 3,
            MsgType::Error => 4,
            MsgType::Unknown(raw) => *raw,
        }
    }

    pub const fn from_i64(raw: i64) -> Self {
        match raw {
            1 => MsgType::Consumer,
            2 => MsgType::Producer,
            3 => MsgType::ConsumerAcl,
            4 => MsgType::Error,
            other => MsgType::Unknown(other),
        }
    }
}

impl From<i64> for MsgType {
    fn from(raw: i64) -> Self {
        Self::from_i64(raw)
    }
}

impl From<MsgType> for i64 {
    fn from(msg_type: MsgType) -> Self {
        msg_type.as_i64()
    }
}
