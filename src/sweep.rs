//! Expiry sweep.
//!
//! The manager never expires tickets on its own. Hosts that want expired
//! subscriptions reaped call [`end_expired`] from whatever scheduler they
//! already run.

use crate::manager::SubscriptionManager;
use crate::store::SubscriptionStore;
use crate::types::{EndStatus, TicketId};
use chrono::{DateTime, Utc};

/// Reason text sent with end notices for expired tickets.
pub const EXPIRED_REASON: &str = "subscription expired";

/// End every ticket whose expiration is at or before `now`. Returns the
/// ids ended by this call; tickets that vanished concurrently are skipped.
pub fn end_expired<S: SubscriptionStore>(
    manager: &SubscriptionManager<S>,
    now: DateTime<Utc>,
) -> Vec<TicketId> {
    let ended: Vec<TicketId> = manager
        .list_tickets()
        .into_iter()
        .filter(|ticket| ticket.is_expired(now))
        .map(|ticket| ticket.id)
        .filter(|id| manager.end(id, EXPIRED_REASON, EndStatus::SourceCancelling))
        .collect();

    if !ended.is_empty() {
        tracing::info!(count = ended.len(), "expired subscriptions ended");
    }
    ended
}
