//! # Text Command Protocol
//!
//! One newline-terminated command per request: a verb followed by
//! whitespace-delimited parameters. Every command gets exactly one
//! length-prefixed response.
//!
//! | verb   | params               | state      | success payload |
//! |--------|----------------------|------------|-----------------|
//! | `PUB`  | `<topic> <body...>`  | Fresh      | `OK`            |
//! | `SUB`  | `<topic> [channel]`  | Fresh      | `OK`            |
//! | `PULL` |                      | Subscribed | encoded frame   |
//! | `FIN`  | `<id>`               | Subscribed | `OK`            |
//! | `REQ`  | `<id>`               | Subscribed | `OK`            |
//! | `CLS`  |                      | any        | `CLOSE_WAIT`    |
//!
//! The `PUB` body is everything after the topic token and its separating
//! whitespace, verbatim.

mod session;

pub use session::{ConnectionState, Session};

use crate::error::ClientError;
use bytes::Bytes;
use types::MessageId;

pub const RESPONSE_OK: &[u8] = b"OK";
pub const RESPONSE_CLOSE_WAIT: &[u8] = b"CLOSE_WAIT";

/// Parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pub { topic: String, body: Bytes },
    Sub { topic: String, channel: Option<String> },
    Pull,
    Fin(MessageId),
    Req(MessageId),
    Cls,
}

impl Command {
    /// Parse one command line (terminator already stripped).
    ///
    /// Tokens are split on ASCII whitespace. Verb, topic, channel and id
    /// tokens must be UTF-8; a `PUB` body is taken as raw bytes.
    pub fn parse(line: &[u8]) -> Result<Self, ClientError> {
        let (verb, rest) =
            next_token(line).ok_or_else(|| ClientError::invalid("empty command"))?;

        match verb {
            b"PUB" => {
                let (topic, rest) = next_token(rest)
                    .ok_or_else(|| ClientError::invalid("PUB requires a topic and a body"))?;
                let body = trim_start(rest);
                if body.is_empty() {
                    return Err(ClientError::invalid("PUB requires a body"));
                }
                Ok(Self::Pub {
                    topic: text(topic)?.to_string(),
                    body: Bytes::copy_from_slice(body),
                })
            }
            b"SUB" => match params(rest).as_slice() {
                [topic] => Ok(Self::Sub {
                    topic: text(topic)?.to_string(),
                    channel: None,
                }),
                [topic, channel] => Ok(Self::Sub {
                    topic: text(topic)?.to_string(),
                    channel: Some(text(channel)?.to_string()),
                }),
                _ => Err(ClientError::invalid("SUB takes a topic and an optional channel")),
            },
            b"PULL" => no_params("PULL", rest).map(|_| Self::Pull),
            b"FIN" => single_id("FIN", rest).map(Self::Fin),
            b"REQ" => single_id("REQ", rest).map(Self::Req),
            b"CLS" => no_params("CLS", rest).map(|_| Self::Cls),
            other => Err(ClientError::invalid(format!(
                "unknown command '{}'",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Pub { .. } => "PUB",
            Self::Sub { .. } => "SUB",
            Self::Pull => "PULL",
            Self::Fin(_) => "FIN",
            Self::Req(_) => "REQ",
            Self::Cls => "CLS",
        }
    }
}

fn trim_start(input: &[u8]) -> &[u8] {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    &input[start..]
}

fn next_token(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let input = trim_start(input);
    if input.is_empty() {
        return None;
    }
    let end = input
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(input.len());
    Some(input.split_at(end))
}

fn params(rest: &[u8]) -> Vec<&[u8]> {
    rest.split(u8::is_ascii_whitespace)
        .filter(|token| !token.is_empty())
        .collect()
}

fn text(token: &[u8]) -> Result<&str, ClientError> {
    std::str::from_utf8(token).map_err(|_| ClientError::invalid("token is not valid UTF-8"))
}

fn no_params(verb: &str, rest: &[u8]) -> Result<(), ClientError> {
    if params(rest).is_empty() {
        Ok(())
    } else {
        Err(ClientError::invalid(format!("{verb} takes no parameters")))
    }
}

fn single_id(verb: &str, rest: &[u8]) -> Result<MessageId, ClientError> {
    match params(rest).as_slice() {
        [id] => text(id)?
            .parse::<MessageId>()
            .map_err(|e| ClientError::invalid(e.to_string())),
        _ => Err(ClientError::invalid(format!("{verb} takes exactly one id"))),
    }
}
