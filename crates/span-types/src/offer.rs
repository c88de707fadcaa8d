//! Offers - resource handles exchanged between deployments

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outbound offer: a resource handle this deployment publishes for a
/// specific beneficiary deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Deployment id the offer is addressed to
    pub beneficiary_id: String,

    /// Offer name, unique per beneficiary
    pub name: String,

    /// Opaque resource handle
    pub value: Value,
}

impl Offer {
    /// Create a new outbound offer.
    pub fn new(beneficiary_id: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self {
            beneficiary_id: beneficiary_id.into(),
            name: name.into(),
            value,
        }
    }
}

/// An offer as it travels on the wire and as the receiving side stores it.
///
/// `value: None` signals withdrawn/unavailable; a withdrawal notification
/// carries the offer identity without a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOffer {
    /// Deployment id the offer came from
    pub origin: String,

    /// Offer name, unique per origin
    pub name: String,

    /// Opaque resource handle; absent when withdrawn/unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl DeploymentOffer {
    /// Create an inbound offer carrying a value.
    pub fn new(origin: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self {
            origin: origin.into(),
            name: name.into(),
            value: Some(value),
        }
    }

    /// Create an offer identity without a value, as used by withdrawal
    /// notifications.
    pub fn withdrawn(origin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            name: name.into(),
            value: None,
        }
    }
}

/// Key identifying an offer within a store: the counterparty deployment id
/// plus the offer name.
///
/// Outbound offers are keyed by beneficiary, inbound offers by origin, and
/// wishes resolve against the target deployment's key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferKey {
    /// Counterparty deployment id
    pub deployment: String,

    /// Offer name
    pub name: String,
}

impl OfferKey {
    /// Create a key from raw parts.
    pub fn new(deployment: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            name: name.into(),
        }
    }

    /// Key of an outbound offer (beneficiary side).
    pub fn of_offer(offer: &Offer) -> Self {
        Self::new(offer.beneficiary_id.clone(), offer.name.clone())
    }

    /// Key of an inbound offer (origin side).
    pub fn of_inbound(offer: &DeploymentOffer) -> Self {
        Self::new(offer.origin.clone(), offer.name.clone())
    }

    /// Key a wish resolves against (target side).
    pub fn of_wish(wish: &super::Wish) -> Self {
        Self::new(wish.target_id.clone(), wish.name.clone())
    }
}

impl fmt::Display for OfferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.deployment, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Wish;
    use serde_json::json;

    #[test]
    fn test_key_display() {
        let key = OfferKey::new("prod-eu", "bucket");
        assert_eq!(key.to_string(), "prod-eu:bucket");
    }

    #[test]
    fn test_keys_agree_across_sides() {
        let offer = Offer::new("b", "bucket", json!("arn:1"));
        let inbound = DeploymentOffer::new("b", "bucket", json!("arn:1"));
        let wish = Wish::new("b", "bucket", false);

        assert_eq!(OfferKey::of_offer(&offer), OfferKey::of_inbound(&inbound));
        assert_eq!(OfferKey::of_offer(&offer), OfferKey::of_wish(&wish));
    }

    #[test]
    fn test_withdrawn_offer_omits_value() {
        let offer = DeploymentOffer::withdrawn("a", "bucket");
        let json = serde_json::to_value(&offer).unwrap();
        assert!(json.get("value").is_none());

        let parsed: DeploymentOffer =
            serde_json::from_value(json!({"origin": "a", "name": "bucket"})).unwrap();
        assert_eq!(parsed.value, None);
    }
}
