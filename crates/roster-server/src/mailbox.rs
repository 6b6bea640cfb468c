//! Outbound mailbox seam between the coordinator and transport adapters.
//!
//! Mailbox delivery is the coordinator's only side effect, so it goes
//! through a trait: production sessions use a bounded tokio channel, and
//! tests can drive the coordinator without a network. Deliveries are
//! non-blocking by contract — the coordinator must never wait on a slow
//! receiver.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::coordinator::Notification;

/// Why a non-blocking delivery was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The mailbox is at capacity; the session is not draining it.
    #[error("mailbox full")]
    Full,

    /// The consuming side dropped the mailbox; the session is gone.
    #[error("mailbox closed")]
    Closed,
}

/// Per-session outbound queue, written only by the coordinator.
///
/// Single producer (the coordinator), single consumer (the session's
/// transport adapter). Implementations must be bounded and must refuse
/// rather than block.
pub trait Mailbox {
    /// Attempt to deliver a notification without blocking.
    fn try_deliver(&self, notification: Notification) -> Result<(), DeliveryError>;
}

impl Mailbox for mpsc::Sender<Notification> {
    fn try_deliver(&self, notification: Notification) -> Result<(), DeliveryError> {
        self.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_succeeds_with_free_capacity() {
        let (tx, mut rx) = mpsc::channel(2);

        tx.try_deliver(Notification::CountChanged { count: 1 }).unwrap();
        assert_eq!(rx.try_recv(), Ok(Notification::CountChanged { count: 1 }));
    }

    #[test]
    fn full_mailbox_refuses_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);

        tx.try_deliver(Notification::CountChanged { count: 1 }).unwrap();
        let refused = tx.try_deliver(Notification::CountChanged { count: 2 });
        assert_eq!(refused, Err(DeliveryError::Full));
    }

    #[test]
    fn closed_mailbox_reports_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let refused = tx.try_deliver(Notification::CountChanged { count: 1 });
        assert_eq!(refused, Err(DeliveryError::Closed));
    }
}
