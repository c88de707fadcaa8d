//! Outbound offer store - this deployment's offers to beneficiaries

use std::collections::HashMap;

use span_types::{Offer, OfferKey};
use tracing::{debug, warn};

/// Fold of local offer upsert/withdraw events into a keyed map.
///
/// The map also backs resend-on-reconnect, so a withdrawn offer's entry is
/// only removed once the beneficiary has acknowledged the withdrawal - the
/// withdrawal protocol calls [`OutboundOfferStore::remove`], nothing else
/// does.
#[derive(Debug, Default)]
pub struct OutboundOfferStore {
    offers: HashMap<OfferKey, Offer>,
}

impl OutboundOfferStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update an offer.
    pub fn upsert(&mut self, offer: Offer) {
        let key = OfferKey::of_offer(&offer);
        debug!(offer = %key, "outbound offer stored");
        self.offers.insert(key, offer);
    }

    /// Whether an offer with this key is stored.
    pub fn contains(&self, key: &OfferKey) -> bool {
        self.offers.contains_key(key)
    }

    /// Look up an offer.
    pub fn get(&self, key: &OfferKey) -> Option<&Offer> {
        self.offers.get(key)
    }

    /// Remove an offer whose withdrawal was acknowledged. Removing an
    /// unknown key logs a warning and is otherwise a no-op.
    pub fn remove(&mut self, key: &OfferKey) -> Option<Offer> {
        let removed = self.offers.remove(key);
        if removed.is_none() {
            warn!(offer = %key, "withdrawal of unknown outbound offer");
        }
        removed
    }

    /// All offers addressed to a beneficiary, sorted by name for a
    /// deterministic resend order.
    pub fn offers_for(&self, beneficiary_id: &str) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .offers
            .values()
            .filter(|o| o.beneficiary_id == beneficiary_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.name.cmp(&b.name));
        offers
    }

    /// Number of stored offers.
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_overwrites_by_key() {
        let mut store = OutboundOfferStore::new();
        store.upsert(Offer::new("b", "bucket", json!("arn:1")));
        store.upsert(Offer::new("b", "bucket", json!("arn:2")));

        assert_eq!(store.len(), 1);
        let key = OfferKey::new("b", "bucket");
        assert_eq!(store.get(&key).unwrap().value, json!("arn:2"));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut store = OutboundOfferStore::new();
        assert!(store.remove(&OfferKey::new("b", "ghost")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_offers_for_filters_and_sorts() {
        let mut store = OutboundOfferStore::new();
        store.upsert(Offer::new("b", "queue", json!("q")));
        store.upsert(Offer::new("b", "bucket", json!("arn")));
        store.upsert(Offer::new("c", "bucket", json!("other")));

        let offers = store.offers_for("b");
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].name, "bucket");
        assert_eq!(offers[1].name, "queue");
    }
}
