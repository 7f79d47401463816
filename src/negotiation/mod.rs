//! Negotiation of the independent subscription axes.
//!
//! A subscribe request is negotiated along four axes, each pure and
//! free of shared state:
//! - Delivery: there must be a usable push endpoint
//! - Format: wrapped or bare notification payloads
//! - Filter: the dialect must be supported and the expression well formed
//! - Expiration: what the client asked for, mapped through policy
//!
//! The manager runs them in that order and only stores a ticket once all
//! four succeed.

mod delivery;
mod expiration;
mod filter;
mod format;
mod xpath;

pub use delivery::{validate_delivery, DeliveryElement, DeliverySpec, NONE_ADDRESS};
pub use expiration::{ExpirationPolicy, ExpirationRequest, ExpirationValue, Grant};
pub use filter::{validate_filter, FilterDialect, XPATH_1_0_DIALECT};
pub use format::{negotiate_format, UNWRAPPED_FORMAT, WRAPPED_FORMAT};
