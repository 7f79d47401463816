//! Ticket storage.
//!
//! The manager owns its store behind a single lock, so implementations do
//! not synchronize internally; `&mut self` methods are only ever called
//! with that lock held.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{Ticket, TicketId};

/// Keyed storage for subscription tickets.
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the ticket stored under `ticket.id`.
    fn put(&mut self, ticket: Ticket);

    fn get(&self, id: &TicketId) -> Option<Ticket>;

    /// Find and remove in one step.
    fn remove(&mut self, id: &TicketId) -> Option<Ticket>;

    /// Snapshot of all tickets, oldest first.
    fn list_all(&self) -> Vec<Ticket>;

    fn contains(&self, id: &TicketId) -> bool {
        self.get(id).is_some()
    }

    fn len(&self) -> usize {
        self.list_all().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make stored tickets durable. No-op for volatile stores.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Order tickets by creation time, then id for ties.
pub(crate) fn creation_order(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
