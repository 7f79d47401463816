//! In-memory ticket store.

use super::{creation_order, SubscriptionStore};
use crate::types::{Ticket, TicketId};
use std::collections::HashMap;

/// Volatile store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tickets: HashMap<TicketId, Ticket>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tickets(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets: tickets.into_iter().map(|t| (t.id, t)).collect(),
        }
    }
}

impl SubscriptionStore for MemoryStore {
    fn put(&mut self, ticket: Ticket) {
        self.tickets.insert(ticket.id, ticket);
    }

    fn get(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.get(id).cloned()
    }

    fn remove(&mut self, id: &TicketId) -> Option<Ticket> {
        self.tickets.remove(id)
    }

    fn list_all(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.tickets.values().cloned().collect();
        creation_order(&mut tickets);
        tickets
    }

    fn contains(&self, id: &TicketId) -> bool {
        self.tickets.contains_key(id)
    }

    fn len(&self) -> usize {
        self.tickets.len()
    }
}
