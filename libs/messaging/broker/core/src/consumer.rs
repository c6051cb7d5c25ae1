//! Consumer capability seen by a channel.
//!
//! A channel never needs to know who a consumer is or how it talks to its
//! client. It only needs to be able to shut it down when the channel closes,
//! so that is the whole contract. Identity inside a channel is `Arc` pointer
//! identity: registering the same `Arc` twice is a no-op.

use std::fmt;
use std::sync::Arc;

/// Closeable consumer registered on a channel
pub trait Consumer: Send + Sync + fmt::Debug {
    /// Forcibly close the consumer. Must not block.
    fn close(&self);
}

/// Identity comparison used by the channel consumer set
pub(crate) fn same_consumer(a: &Arc<dyn Consumer>, b: &Arc<dyn Consumer>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
