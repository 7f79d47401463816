//! Error types for subscription negotiation and lifecycle operations.

use crate::types::TicketId;
use thiserror::Error;

/// Main error type for subscription operations.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("No delivery mechanism established: {0}")]
    NoDeliveryMechanismEstablished(String),

    #[error("Filtering dialect not supported: {0}")]
    FilteringUnavailable(String),

    #[error("Cannot process filter in dialect {dialect}: {reason}")]
    CannotProcessFilter { dialect: String, reason: String },

    #[error("Delivery format not supported: {0}")]
    DeliveryFormatUnavailable(String),

    #[error("Invalid expiration {value:?}: {reason}")]
    InvalidExpiration { value: String, reason: String },

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(TicketId),

    /// A policy duration ran off the calendar. Client durations that do
    /// this are reported as `InvalidExpiration`.
    #[error("Expiration arithmetic overflow: {0}")]
    ExpirationOverflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Store is locked by another process")]
    Locked,
}

/// Coarse classification of a fault, used by protocol layers to pick a
/// fault code without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// Unparsable expiration or filter expression.
    MalformedInput,
    /// Unsupported filter dialect or delivery format.
    UnsupportedOption,
    /// No usable push endpoint.
    MissingCapability,
    /// The operation needs a ticket that does not exist.
    NotFound,
    /// Date arithmetic failed; not caused by the request shape.
    Internal,
    /// Durable store failure.
    Storage,
}

impl SubscriptionError {
    pub fn kind(&self) -> FaultKind {
        match self {
            SubscriptionError::InvalidExpiration { .. }
            | SubscriptionError::CannotProcessFilter { .. } => FaultKind::MalformedInput,
            SubscriptionError::FilteringUnavailable(_)
            | SubscriptionError::DeliveryFormatUnavailable(_) => FaultKind::UnsupportedOption,
            SubscriptionError::NoDeliveryMechanismEstablished(_) => FaultKind::MissingCapability,
            SubscriptionError::UnknownSubscription(_) => FaultKind::NotFound,
            SubscriptionError::ExpirationOverflow(_) => FaultKind::Internal,
            SubscriptionError::Io(_)
            | SubscriptionError::Serialization(_)
            | SubscriptionError::Deserialization(_)
            | SubscriptionError::InvalidFormat(_)
            | SubscriptionError::Corruption(_)
            | SubscriptionError::Locked => FaultKind::Storage,
        }
    }

    pub(crate) fn invalid_expiration(value: &str, reason: impl Into<String>) -> Self {
        SubscriptionError::InvalidExpiration {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SubscriptionError {
    fn from(e: serde_json::Error) -> Self {
        SubscriptionError::Deserialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for SubscriptionError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        SubscriptionError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SubscriptionError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        SubscriptionError::Deserialization(e.to_string())
    }
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
