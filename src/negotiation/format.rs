//! Delivery format negotiation.

use crate::error::{Result, SubscriptionError};

/// Notifications wrapped in an envelope element.
pub const WRAPPED_FORMAT: &str = "http://www.w3.org/2011/03/ws-evt/DeliveryFormats/Wrap";

/// Notifications delivered bare.
pub const UNWRAPPED_FORMAT: &str = "http://www.w3.org/2011/03/ws-evt/DeliveryFormats/Unwrap";

/// Returns whether delivery is wrapped. Unwrapped unless asked otherwise.
pub fn negotiate_format(requested: Option<&str>) -> Result<bool> {
    match requested.map(str::trim) {
        None | Some("") => Ok(false),
        Some(WRAPPED_FORMAT) => Ok(true),
        Some(UNWRAPPED_FORMAT) => Ok(false),
        Some(other) => Err(SubscriptionError::DeliveryFormatUnavailable(other.to_string())),
    }
}
