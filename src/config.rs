//! Manager configuration.

use crate::duration::IsoDuration;
use crate::error::Result;
use crate::negotiation::ExpirationPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for a [`SubscriptionManager`](crate::SubscriptionManager).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Granted when a subscriber asks for no particular expiration.
    /// Default: P2Y
    pub default_grant: IsoDuration,

    /// Granted in place of a zero ("as long as possible") duration.
    /// Default: P5Y
    pub max_grant: IsoDuration,

    /// Address placed in the manager reference handed to subscribers.
    pub manager_address: String,

    /// Reference parameter carrying the ticket id in that reference.
    pub identifier_parameter: String,
}

impl ManagerConfig {
    /// Parse a JSON config fragment. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn expiration_policy(&self) -> ExpirationPolicy {
        ExpirationPolicy::new(self.default_grant, self.max_grant)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_grant: IsoDuration::years(2),
            max_grant: IsoDuration::years(5),
            manager_address: "urn:eventing:subscription-manager".to_string(),
            identifier_parameter: "Identifier".to_string(),
        }
    }
}
