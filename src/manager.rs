//! Subscription manager: negotiates, issues, renews and ends tickets.

use crate::config::ManagerConfig;
use crate::error::{Result, SubscriptionError};
use crate::negotiation::{
    negotiate_format, validate_delivery, validate_filter, DeliverySpec, ExpirationPolicy,
    ExpirationRequest, ExpirationValue,
};
use crate::sink::NotificationSink;
use crate::store::{MemoryStore, SubscriptionStore};
use crate::types::{
    EndStatus, EndpointReference, FilterSpec, GrantResponse, GrantedExpiration, Ticket, TicketId,
};
use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Requested expiration in its lexical form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiresSpec {
    /// Duration (`PT10M`) or date-time (`2030-01-01T00:00:00Z`).
    pub value: String,
    pub best_effort: bool,
}

/// Decoded fields of a subscribe request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribeRequest {
    pub delivery: Option<DeliverySpec>,
    pub end_to: Option<EndpointReference>,
    pub expires: Option<ExpiresSpec>,
    pub filter: Option<FilterSpec>,
    pub format: Option<String>,
}

impl SubscribeRequest {
    /// Push delivery to `notify_to`, everything else left to policy.
    pub fn push(notify_to: EndpointReference) -> Self {
        Self {
            delivery: Some(DeliverySpec::push(notify_to)),
            ..Default::default()
        }
    }

    pub fn end_to(mut self, end_to: EndpointReference) -> Self {
        self.end_to = Some(end_to);
        self
    }

    pub fn expires(mut self, value: impl Into<String>, best_effort: bool) -> Self {
        self.expires = Some(ExpiresSpec {
            value: value.into(),
            best_effort,
        });
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Owns all subscription tickets on behalf of the store.
///
/// Every store access goes through one lock. Negotiation runs before the
/// lock is taken, and end notifications are sent after it is released.
pub struct SubscriptionManager<S: SubscriptionStore = MemoryStore> {
    store: RwLock<S>,
    sink: Arc<dyn NotificationSink>,
    policy: ExpirationPolicy,
    config: ManagerConfig,
}

impl SubscriptionManager<MemoryStore> {
    /// Manager over a fresh in-memory store with default configuration.
    pub fn in_memory(sink: Arc<dyn NotificationSink>) -> Self {
        Self::new(MemoryStore::new(), sink)
    }
}

impl<S: SubscriptionStore> SubscriptionManager<S> {
    pub fn new(store: S, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_config(store, sink, ManagerConfig::default())
    }

    pub fn with_config(store: S, sink: Arc<dyn NotificationSink>, config: ManagerConfig) -> Self {
        Self {
            store: RwLock::new(store),
            sink,
            policy: config.expiration_policy(),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Negotiate and issue a new ticket.
    ///
    /// Delivery, format, filter and expiration are negotiated in that
    /// order; the first failure is returned and nothing is stored.
    pub fn subscribe(&self, request: SubscribeRequest) -> Result<(Ticket, GrantResponse)> {
        let notify_to = validate_delivery(request.delivery.as_ref())?;
        let wrapped_delivery = negotiate_format(request.format.as_deref())?;
        validate_filter(request.filter.as_ref())?;

        let expiration = request
            .expires
            .as_ref()
            .map(|e| ExpirationRequest::parse(&e.value, e.best_effort))
            .transpose()?;

        let now = Utc::now();
        let grant = self.policy.grant(expiration.as_ref(), now)?;

        let mut ticket = Ticket {
            id: TicketId::generate(),
            notify_to,
            end_to: request.end_to,
            expires_at: grant.expires_at,
            non_expiring: grant.non_expiring,
            filter: request.filter,
            wrapped_delivery,
            created_at: now,
        };

        {
            let mut store = self.store.write();
            while store.contains(&ticket.id) {
                ticket.id = TicketId::generate();
            }
            store.put(ticket.clone());
        }

        info!(
            id = %ticket.id,
            notify_to = %ticket.notify_to.address,
            expires_at = %ticket.expires_at,
            non_expiring = ticket.non_expiring,
            wrapped = ticket.wrapped_delivery,
            "subscription created"
        );

        let response = self.grant_response(&ticket);
        Ok((ticket, response))
    }

    /// Extend or reset a ticket's expiration. Returns the new expiration.
    pub fn renew(&self, id: &TicketId, expires: &str) -> Result<DateTime<FixedOffset>> {
        let value = ExpirationValue::parse(expires)?;

        let mut store = self.store.write();
        let mut ticket = store
            .get(id)
            .ok_or(SubscriptionError::UnknownSubscription(*id))?;

        let expires_at = self.policy.renew(ticket.expires_at, &value)?;
        ticket.expires_at = expires_at;
        store.put(ticket);
        drop(store);

        debug!(id = %id, expires_at = %expires_at, "subscription renewed");
        Ok(expires_at)
    }

    /// Current grant of a live ticket.
    pub fn get_status(&self, id: &TicketId) -> Result<GrantedExpiration> {
        self.store
            .read()
            .get(id)
            .map(|t| t.granted_expiration())
            .ok_or(SubscriptionError::UnknownSubscription(*id))
    }

    /// Remove a ticket. Unknown ids are ignored. Returns whether a ticket
    /// was removed by this call.
    pub fn unsubscribe(&self, id: &TicketId) -> bool {
        let removed = self.store.write().remove(id).is_some();
        debug!(id = %id, removed, "unsubscribe");
        removed
    }

    pub fn find_ticket(&self, id: &TicketId) -> Option<Ticket> {
        self.store.read().get(id)
    }

    /// Snapshot of all live tickets, oldest first.
    pub fn list_tickets(&self) -> Vec<Ticket> {
        self.store.read().list_all()
    }

    pub fn ticket_count(&self) -> usize {
        self.store.read().len()
    }

    /// End a subscription other than by client request.
    ///
    /// The ticket is removed under the store lock; whichever caller removes
    /// it owns the notification decision, so racing `end`/`unsubscribe`
    /// calls yield at most one notice. The sink is called after the lock is
    /// released. Returns whether this call ended the ticket.
    pub fn end(&self, id: &TicketId, reason: &str, status: EndStatus) -> bool {
        let removed = self.store.write().remove(id);

        let Some(ticket) = removed else {
            warn!(id = %id, status = %status, "end requested for unknown subscription");
            return false;
        };

        info!(id = %id, status = %status, reason, "subscription ended");

        if ticket.end_to.is_some() {
            self.sink.notify_ended(&ticket, reason, status);
        }
        true
    }

    /// End every live ticket because the event source is going away.
    /// Returns how many were ended by this call.
    pub fn shutdown(&self, reason: &str) -> usize {
        let ids: Vec<TicketId> = self.list_tickets().into_iter().map(|t| t.id).collect();
        let ended = ids
            .iter()
            .filter(|id| self.end(id, reason, EndStatus::SourceShuttingDown))
            .count();
        info!(ended, "subscription manager shut down");
        ended
    }

    /// Make stored tickets durable, if the store supports it.
    ///
    /// Subscribe, renew and unsubscribe do not flush on their own. With a
    /// [`FileStore`](crate::FileStore), changes since the last flush are lost
    /// if the process dies. Safe to call from several threads at once.
    pub fn flush(&self) -> Result<()> {
        self.store.read().flush()
    }

    /// Reference a client presents on later calls.
    pub fn manager_reference(&self, id: &TicketId) -> EndpointReference {
        EndpointReference::new(self.config.manager_address.clone())
            .with_parameter(self.config.identifier_parameter.clone(), id.to_string())
    }

    /// Recover the ticket id from a manager reference echoed by a client.
    pub fn ticket_id_from_reference(&self, reference: &EndpointReference) -> Option<TicketId> {
        reference
            .parameter(&self.config.identifier_parameter)
            .and_then(TicketId::parse)
    }

    fn grant_response(&self, ticket: &Ticket) -> GrantResponse {
        GrantResponse {
            id: ticket.id,
            manager_reference: self.manager_reference(&ticket.id),
            expires: ticket.granted_expiration(),
            expires_at: ticket.expires_at,
            filter: ticket.filter.clone(),
            wrapped_delivery: ticket.wrapped_delivery,
        }
    }
}
