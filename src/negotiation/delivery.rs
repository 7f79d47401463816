//! Delivery negotiation: a subscription needs somewhere to push to.

use crate::error::{Result, SubscriptionError};
use crate::types::EndpointReference;
use serde::{Deserialize, Serialize};

/// WS-Addressing address that means "no endpoint".
pub const NONE_ADDRESS: &str = "http://www.w3.org/2005/08/addressing/none";

/// One content element of a delivery specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryElement {
    /// Push endpoint for notifications.
    NotifyTo(EndpointReference),
    /// Anything else the protocol layer decoded but this core doesn't use.
    Other(String),
}

/// Delivery specification as decoded from a subscribe request.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliverySpec {
    pub content: Vec<DeliveryElement>,
}

impl DeliverySpec {
    /// Push delivery to `notify_to`.
    pub fn push(notify_to: EndpointReference) -> Self {
        Self {
            content: vec![DeliveryElement::NotifyTo(notify_to)],
        }
    }
}

/// Extract the push endpoint. Only the first content element counts.
pub fn validate_delivery(delivery: Option<&DeliverySpec>) -> Result<EndpointReference> {
    let missing = |why: &str| SubscriptionError::NoDeliveryMechanismEstablished(why.to_string());

    let delivery = delivery.ok_or_else(|| missing("no delivery specified"))?;
    let first = delivery
        .content
        .first()
        .ok_or_else(|| missing("delivery has no content"))?;

    let DeliveryElement::NotifyTo(notify_to) = first else {
        return Err(missing("first delivery element is not a notify-to reference"));
    };

    let address = notify_to.address.trim();
    if address.is_empty() {
        return Err(missing("notify-to address is empty"));
    }
    if address == NONE_ADDRESS {
        return Err(missing("notify-to address is the none address"));
    }

    Ok(notify_to.clone())
}
