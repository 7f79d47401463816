//! Core types for subscription tickets and grants.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a subscription ticket (random 128-bit value).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Uuid);

impl TicketId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        TicketId(Uuid::new_v4())
    }

    /// Parse an identifier echoed back by a client. Returns `None` for text
    /// that cannot name any ticket.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text.trim()).ok().map(TicketId)
    }
}

impl fmt::Debug for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketId({})", self.0)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a remote endpoint: an address plus the reference
/// parameters the endpoint expects to see echoed back.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointReference {
    pub address: String,
    #[serde(default)]
    pub reference_parameters: BTreeMap<String, String>,
}

impl EndpointReference {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reference_parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.reference_parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.reference_parameters.get(name).map(String::as_str)
    }
}

/// A filter as requested by the subscriber. Stored verbatim, never evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Dialect URI naming the filter language.
    pub dialect: String,
    /// Raw expression text.
    pub expression: String,
}

impl FilterSpec {
    pub fn new(dialect: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            expression: expression.into(),
        }
    }
}

/// The durable record of one accepted subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,

    /// Where event notifications are pushed.
    pub notify_to: EndpointReference,

    /// Where the "subscription ended" message goes, if anywhere.
    pub end_to: Option<EndpointReference>,

    /// Granted absolute expiration. Always concrete, even for
    /// non-expiring tickets (which carry the policy cap here).
    pub expires_at: DateTime<FixedOffset>,

    /// Client asked for an indefinite subscription.
    pub non_expiring: bool,

    pub filter: Option<FilterSpec>,

    /// Wrap notification payloads in an envelope element.
    pub wrapped_delivery: bool,

    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Whether the granted expiration has passed at `now`.
    ///
    /// Non-expiring tickets still carry a finite cap and expire at it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.with_timezone(&Utc) <= now
    }

    /// The grant as it is reported externally.
    pub fn granted_expiration(&self) -> GrantedExpiration {
        if self.non_expiring {
            GrantedExpiration::Indefinite
        } else {
            GrantedExpiration::At(self.expires_at)
        }
    }
}

/// Externally reported expiration of a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GrantedExpiration {
    /// Reported as the zero duration.
    Indefinite,
    At(DateTime<FixedOffset>),
}

impl fmt::Display for GrantedExpiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantedExpiration::Indefinite => write!(f, "PT0S"),
            GrantedExpiration::At(at) => write!(f, "{}", at.to_rfc3339()),
        }
    }
}

/// Negotiated outcome returned to the subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrantResponse {
    pub id: TicketId,

    /// Reference the client presents on renew, status and unsubscribe.
    pub manager_reference: EndpointReference,

    pub expires: GrantedExpiration,

    /// Concrete expiration behind `expires`.
    pub expires_at: DateTime<FixedOffset>,

    pub filter: Option<FilterSpec>,

    pub wrapped_delivery: bool,
}

/// Why a subscription ended, as reported to the end-to endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndStatus {
    #[serde(rename = "http://www.w3.org/2011/03/ws-evt/DeliveryFailure")]
    DeliveryFailure,
    #[serde(rename = "http://www.w3.org/2011/03/ws-evt/SourceShuttingDown")]
    SourceShuttingDown,
    #[serde(rename = "http://www.w3.org/2011/03/ws-evt/SourceCancelling")]
    SourceCancelling,
}

impl EndStatus {
    pub fn uri(&self) -> &'static str {
        match self {
            EndStatus::DeliveryFailure => "http://www.w3.org/2011/03/ws-evt/DeliveryFailure",
            EndStatus::SourceShuttingDown => "http://www.w3.org/2011/03/ws-evt/SourceShuttingDown",
            EndStatus::SourceCancelling => "http://www.w3.org/2011/03/ws-evt/SourceCancelling",
        }
    }
}

impl fmt::Display for EndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}
