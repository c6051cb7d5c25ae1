//! # Broker Core Infrastructure
//!
//! Delivery machinery shared by every broker front end: the unique-id
//! supplier, the channel delivery engine, topics and the topic registry.
//!
//! ## Architecture Role
//!
//! ```mermaid
//! graph LR
//!     Publisher[PUB handler] -->|next id| Ids[IdSupplier]
//!     Publisher -->|get_or_create| Registry[TopicRegistry]
//!     Registry --> Topic
//!     Topic -->|put| ChA[Channel 'default']
//!     Topic -->|put| ChB[Channel 'audit']
//!     ChA -->|pull / finish / requeue| ConsumerA[Consumers]
//!     ChB -->|pull / finish / requeue| ConsumerB[Consumers]
//! ```
//!
//! Every channel is an actor: one owner task holds the buffer, the in-flight
//! table and the consumer set, and everything else talks to it through
//! request inboxes. Topic and channel creation is the only place a shared
//! map is touched.

pub mod channel;
pub mod consumer;
pub mod error;
pub mod ids;
pub mod topics;

pub use channel::{Channel, ChannelConfig, ChannelSnapshot, ChannelStats};
pub use consumer::Consumer;
pub use error::{ChannelError, ChannelResult, CoreError, CoreResult};
pub use ids::IdSupplier;
pub use topics::{Topic, TopicConfig, TopicRegistry};
