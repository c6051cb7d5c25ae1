//! Per-delivery timeout timers.
//!
//! A watchdog is armed each time a message moves into flight. It owns no
//! channel state: on expiry it only reports `(id, delivery)` to the owner's
//! timeout inbox, and the owner decides whether the report is still current.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use types::MessageId;

/// Expiry report sent by a watchdog to its channel owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expired {
    pub id: MessageId,
    /// Delivery sequence the watchdog was armed for
    pub delivery: u64,
}

/// Cancellation handle for an armed timer task
#[derive(Debug)]
pub(crate) struct Watchdog {
    cancel: oneshot::Sender<()>,
}

impl Watchdog {
    /// Spawn a timer task for one delivery of `id`
    pub(crate) fn arm(
        id: MessageId,
        delivery: u64,
        timeout: Duration,
        expired_tx: mpsc::UnboundedSender<Expired>,
    ) -> Self {
        let (cancel, cancelled) = oneshot::channel();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    // Owner gone means the channel shut down; nothing to report
                    let _ = expired_tx.send(Expired { id, delivery });
                }
                // Fires on explicit cancel and when the handle is dropped
                _ = cancelled => {}
            }
        });

        Self { cancel }
    }

    /// Stop the timer; a no-op if it already fired
    pub(crate) fn cancel(self) {
        let _ = self.cancel.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reports_id_and_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watchdog = Watchdog::arm(MessageId::new(3), 9, Duration::from_secs(5), tx);

        let expired = rx.recv().await.unwrap();
        assert_eq!(
            expired,
            Expired {
                id: MessageId::new(3),
                delivery: 9
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_watchdog_stays_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watchdog = Watchdog::arm(MessageId::new(3), 1, Duration::from_secs(5), tx);
        watchdog.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
