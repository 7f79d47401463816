//! # Eventing Core
//!
//! Subscription lifecycle and grant negotiation for a publish/subscribe
//! backend.
//!
//! ## Core Concepts
//!
//! - **Tickets**: The durable record of one accepted subscription
//! - **Negotiation**: Delivery, format, filter and expiration are checked
//!   independently before a ticket is issued
//! - **Grants**: What the subscriber actually gets, which may differ from
//!   what it asked for
//! - **End of life**: Tickets ended by the source (not the client) trigger
//!   a notice to the subscriber's end-to endpoint
//!
//! The wire protocol, notification delivery and scheduling live outside
//! this crate; it is called with decoded request fields.
//!
//! ## Example
//!
//! ```ignore
//! use eventing_core::{ChannelSink, EndpointReference, SubscribeRequest, SubscriptionManager};
//!
//! let (sink, notices) = ChannelSink::new(1024);
//! let manager = SubscriptionManager::in_memory(Arc::new(sink));
//!
//! let (ticket, grant) = manager.subscribe(
//!     SubscribeRequest::push(EndpointReference::new("http://client/events"))
//!         .expires("PT10M", false),
//! )?;
//!
//! manager.renew(&ticket.id, "PT10M")?;
//! manager.unsubscribe(&ticket.id);
//! ```

pub mod config;
pub mod duration;
pub mod error;
pub mod manager;
pub mod negotiation;
pub mod sink;
pub mod store;
pub mod sweep;
pub mod types;

// Re-exports
pub use config::ManagerConfig;
pub use duration::IsoDuration;
pub use error::{FaultKind, Result, SubscriptionError};
pub use manager::{ExpiresSpec, SubscribeRequest, SubscriptionManager};
pub use negotiation::{
    DeliveryElement, DeliverySpec, ExpirationPolicy, ExpirationRequest, ExpirationValue,
    FilterDialect, Grant, NONE_ADDRESS, UNWRAPPED_FORMAT, WRAPPED_FORMAT, XPATH_1_0_DIALECT,
};
pub use sink::{ChannelSink, EndNotice, EndNoticeReceiver, NotificationSink};
pub use store::{FileStore, MemoryStore, SubscriptionStore};
pub use types::*;
