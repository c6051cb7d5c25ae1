//! # Broker Service
//!
//! Network front end for the broker core: the text command protocol, the
//! per-connection handler, the TCP accept loop and a typed client.
//!
//! ## Architecture Role
//!
//! ```mermaid
//! graph LR
//!     Client[TCP client] -->|"PUB / SUB / PULL / FIN / REQ / CLS"| Conn[Connection task]
//!     Conn --> Session[Session dispatcher]
//!     Session -->|publish| Registry[TopicRegistry]
//!     Session -->|pull / finish / requeue| Channel
//!     Channel -->|close| Consumer[NetworkConsumer]
//!     Consumer -.->|stop signal| Conn
//! ```
//!
//! ## Wire Format
//!
//! Requests are newline-terminated text lines. Every response is a 4-byte
//! big-endian length followed by the payload: `OK`, `CLOSE_WAIT`, an error code
//! such as `E_INVALID`, or for `PULL` an encoded delivery frame.

pub mod client;
pub mod connection;
pub mod context;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::BrokerClient;
pub use connection::{handle_connection, NetworkConsumer};
pub use context::BrokerContext;
pub use error::{
    BrokerError, BrokerResult, ClientError, ProtocolError, E_CHANNEL_CLOSED, E_INVALID,
    E_NOT_IN_FLIGHT,
};
pub use protocol::{Command, ConnectionState, Session};
pub use server::BrokerServer;
