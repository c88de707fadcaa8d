//! Wishes - dependency declarations on remote offers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A wish: one deployment's dependency on a named offer from a target
/// deployment.
///
/// A wish is a query, not persisted state; `is_deployed` reports whether the
/// asking deployment currently has the wished-for value materialized in its
/// own infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wish {
    /// Deployment id the wish targets
    pub target_id: String,

    /// Name of the wished-for offer
    pub name: String,

    /// Whether the asking deployment has this wish materialized
    pub is_deployed: bool,
}

impl Wish {
    /// Create a new wish.
    pub fn new(target_id: impl Into<String>, name: impl Into<String>, is_deployed: bool) -> Self {
        Self {
            target_id: target_id.into(),
            name: name.into(),
            is_deployed,
        }
    }
}

/// Answer to a wish poll.
///
/// Invariant: a defined `offer` implies `is_withdrawn == false`. The
/// constructors are the only way this type is built, which keeps the
/// invariant by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOffer {
    /// The origin has withdrawn the offer
    pub is_withdrawn: bool,

    /// Offer value, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<Value>,
}

impl RemoteOffer {
    /// Answer for an unknown or never-offered wish: not withdrawn, no value.
    pub fn unknown() -> Self {
        Self {
            is_withdrawn: false,
            offer: None,
        }
    }

    /// Answer for a withdrawn offer.
    pub fn withdrawn() -> Self {
        Self {
            is_withdrawn: true,
            offer: None,
        }
    }

    /// Answer for an available offer; the value may itself be absent when
    /// the offer was registered without one.
    pub fn available(offer: Option<Value>) -> Self {
        Self {
            is_withdrawn: false,
            offer,
        }
    }

    /// True when neither a value nor a withdrawal is reported.
    pub fn is_unknown(&self) -> bool {
        !self.is_withdrawn && self.offer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_invariant() {
        assert!(!RemoteOffer::unknown().is_withdrawn);
        assert!(RemoteOffer::unknown().offer.is_none());

        assert!(RemoteOffer::withdrawn().is_withdrawn);
        assert!(RemoteOffer::withdrawn().offer.is_none());

        let available = RemoteOffer::available(Some(json!("arn:1")));
        assert!(!available.is_withdrawn);
        assert_eq!(available.offer, Some(json!("arn:1")));
    }

    #[test]
    fn test_unknown_answer_wire_shape() {
        let json = serde_json::to_value(RemoteOffer::unknown()).unwrap();
        assert_eq!(json, json!({"isWithdrawn": false}));
    }
}
