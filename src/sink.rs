//! End-of-life notification delivery.
//!
//! The manager only decides *whether* a "subscription ended" message is
//! owed; pushing it to the remote endpoint is the sink's job, including
//! any timeout or retry.

use crate::types::{EndStatus, Ticket};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Receives "subscription ended" events.
///
/// Called without the store lock held. Implementations should return
/// quickly and hand slow work off elsewhere.
pub trait NotificationSink: Send + Sync {
    fn notify_ended(&self, ticket: &Ticket, reason: &str, status: EndStatus);
}

/// A subscription-ended event as queued by [`ChannelSink`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndNotice {
    pub ticket: Ticket,
    pub reason: String,
    pub status: EndStatus,
    pub ended_at: DateTime<Utc>,
}

/// Sink that queues notices on a bounded channel for a delivery worker.
pub struct ChannelSink {
    sender: Sender<EndNotice>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the delivery worker.
    pub fn new(buffer_size: usize) -> (Self, EndNoticeReceiver) {
        let (sender, receiver) = bounded(buffer_size);
        (Self { sender }, EndNoticeReceiver { receiver })
    }
}

impl NotificationSink for ChannelSink {
    fn notify_ended(&self, ticket: &Ticket, reason: &str, status: EndStatus) {
        let notice = EndNotice {
            ticket: ticket.clone(),
            reason: reason.to_string(),
            status,
            ended_at: Utc::now(),
        };

        match self.sender.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(notice)) => {
                tracing::warn!(id = %notice.ticket.id, "end notice dropped, channel full");
            }
            Err(TrySendError::Disconnected(notice)) => {
                tracing::warn!(id = %notice.ticket.id, "end notice dropped, receiver gone");
            }
        }
    }
}

/// Receiving end of a [`ChannelSink`].
pub struct EndNoticeReceiver {
    receiver: Receiver<EndNotice>,
}

impl EndNoticeReceiver {
    /// Receive the next notice (blocking).
    pub fn recv(&self) -> Result<EndNotice, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notice (non-blocking).
    pub fn try_recv(&self) -> Result<EndNotice, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<EndNotice, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<EndNotice> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EndpointReference, TicketId};
    use chrono::TimeDelta;
    use std::time::Duration;

    fn make_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: TicketId::generate(),
            notify_to: EndpointReference::new("http://sink.example/events"),
            end_to: Some(EndpointReference::new("http://sink.example/ended")),
            expires_at: (now + TimeDelta::minutes(5)).fixed_offset(),
            non_expiring: false,
            filter: None,
            wrapped_delivery: false,
            created_at: now,
        }
    }

    #[test]
    fn test_notice_delivered() {
        let (sink, receiver) = ChannelSink::new(4);
        let ticket = make_ticket();

        sink.notify_ended(&ticket, "source going away", EndStatus::SourceShuttingDown);

        let notice = receiver.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(notice.ticket.id, ticket.id);
        assert_eq!(notice.reason, "source going away");
        assert_eq!(notice.status, EndStatus::SourceShuttingDown);
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (sink, receiver) = ChannelSink::new(1);
        let ticket = make_ticket();

        sink.notify_ended(&ticket, "first", EndStatus::SourceCancelling);
        sink.notify_ended(&ticket, "second", EndStatus::SourceCancelling);

        let notices = receiver.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].reason, "first");
    }

    #[test]
    fn test_disconnected_receiver_is_harmless() {
        let (sink, receiver) = ChannelSink::new(1);
        drop(receiver);
        sink.notify_ended(&make_ticket(), "nobody listening", EndStatus::DeliveryFailure);
    }
}
