//! # Unique-ID Supplier
//!
//! One background task generates ids ahead of demand into a bounded MPMC
//! queue. Callers obtain an id with a single receive, so publishing never
//! contends on a shared counter lock.
//!
//! ```text
//!   producer task ──▶ [ bounded queue (buffer_size) ] ──▶ next() from any task
//!   id, id+1, ...                                        (each id received once)
//! ```
//!
//! Ids are consecutive from the configured first id and never repeat for the
//! lifetime of the supplier. The producer runs until every handle is dropped.

use crate::{CoreError, CoreResult};
use tracing::debug;
use types::MessageId;

/// Cloneable handle onto the id queue
#[derive(Debug, Clone)]
pub struct IdSupplier {
    rx: flume::Receiver<MessageId>,
}

impl IdSupplier {
    /// Spawn the producer task on the current tokio runtime
    pub fn spawn(first_id: u64, buffer_size: usize) -> Self {
        let (tx, rx) = flume::bounded(buffer_size.max(1));

        tokio::spawn(async move {
            let mut next = first_id;
            loop {
                if tx.send_async(MessageId::new(next)).await.is_err() {
                    debug!(last_id = next, "Id supplier has no receivers, stopping");
                    break;
                }
                next = next.wrapping_add(1);
            }
        });

        Self { rx }
    }

    /// Obtain a fresh id, waiting only if the producer has fallen behind
    pub async fn next(&self) -> CoreResult<MessageId> {
        self.rx
            .recv_async()
            .await
            .map_err(|_| CoreError::IdSupplierStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_ids_are_consecutive() {
        let ids = IdSupplier::spawn(7, 4);
        assert_eq!(ids.next().await.unwrap(), MessageId::new(7));
        assert_eq!(ids.next().await.unwrap(), MessageId::new(8));
        assert_eq!(ids.next().await.unwrap(), MessageId::new(9));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_share_an_id() {
        let ids = IdSupplier::spawn(1, 16);
        let mut handles = Vec::new();

        for _ in 0..16 {
            let ids = ids.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::with_capacity(250);
                for _ in 0..250 {
                    taken.push(ids.next().await.unwrap());
                }
                taken
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "id {} handed out twice", id);
            }
        }
        assert_eq!(seen.len(), 16 * 250);
    }
}
