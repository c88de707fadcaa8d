//! Inbound offer store - offers received from origin deployments
//!
//! One record per `origin:name` key, driven by a small state machine:
//!
//! - `upsert` (peer forwarded the offer): stores the value, always clears
//!   `withdrawn`
//! - `poll_deployed` (local wish reports it is materialized): marks
//!   `deployed`, creating the record if the offer has not re-arrived yet
//!   after a restart
//! - `poll_undeployed` (local wish polls while not materialized): if the
//!   offer is present, not withdrawn, and carries a value, proactively marks
//!   `deployed` - the poll is expected to cause deployment
//! - `withdraw` (origin asked for release): marks `withdrawn`, creating a
//!   transient record if absent
//! - `release`: deletes the record, legal only while `withdrawn` holds
//!
//! A record with `withdrawn` set and `deployed` clear is transient: the
//! runtime releases it as soon as the initialization gate is open.

use std::collections::HashMap;

use span_types::{DeploymentOffer, OfferKey, RemoteOffer, Wish};
use tracing::{debug, warn};

/// Per-key state for an offer received from an origin deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundOfferRecord {
    /// A local wish has this offer materialized in infrastructure
    pub deployed: bool,

    /// The origin asked for the offer to be released
    pub withdrawn: bool,

    /// The offer as last received; absent when only polls/withdrawals have
    /// been seen so far
    pub offer: Option<DeploymentOffer>,
}

/// Fold of inbound offer events into `origin:name` records.
#[derive(Debug, Default)]
pub struct InboundOfferStore {
    records: HashMap<OfferKey, InboundOfferRecord>,
}

impl InboundOfferStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an offer received from its origin. Always clears `withdrawn`;
    /// an origin re-offering after a withdrawal supersedes it.
    pub fn upsert(&mut self, offer: DeploymentOffer) {
        let key = OfferKey::of_inbound(&offer);
        let record = self.records.entry(key.clone()).or_insert(InboundOfferRecord {
            deployed: false,
            withdrawn: false,
            offer: None,
        });
        record.withdrawn = false;
        record.offer = Some(offer);
        debug!(offer = %key, deployed = record.deployed, "inbound offer stored");
    }

    /// A local wish confirmed the offer is materialized. Creates the record
    /// if absent - after a restart the consumer's resource can exist before
    /// the provider's offer has re-arrived.
    pub fn poll_deployed(&mut self, key: &OfferKey) {
        let record = self.records.entry(key.clone()).or_insert(InboundOfferRecord {
            deployed: false,
            withdrawn: false,
            offer: None,
        });
        if !record.deployed {
            debug!(offer = %key, "inbound offer marked deployed");
        }
        record.deployed = true;
    }

    /// A local wish polled while not materialized. If the offer is present
    /// with a value and not withdrawn, the poll is expected to cause
    /// deployment, so the record is proactively marked deployed; otherwise
    /// this is a no-op.
    pub fn poll_undeployed(&mut self, key: &OfferKey) {
        if let Some(record) = self.records.get_mut(key) {
            let has_value = record
                .offer
                .as_ref()
                .is_some_and(|o| o.value.is_some());
            if !record.withdrawn && has_value {
                debug!(offer = %key, "undeployed poll with available offer; marking deployed");
                record.deployed = true;
            }
        }
    }

    /// The origin asked for the offer to be released. Creates a
    /// `{deployed: false, withdrawn: true}` record if absent. Returns true
    /// when the record is immediately releasable (`deployed` is clear).
    pub fn withdraw(&mut self, key: &OfferKey) -> bool {
        let record = self.records.entry(key.clone()).or_insert(InboundOfferRecord {
            deployed: false,
            withdrawn: false,
            offer: None,
        });
        record.withdrawn = true;
        debug!(offer = %key, deployed = record.deployed, "inbound offer withdrawn");
        !record.deployed
    }

    /// Delete a fully-released record. Only legal while `withdrawn` holds;
    /// anything else is a protocol anomaly logged as a warning. Returns
    /// true when the record was deleted.
    pub fn release(&mut self, key: &OfferKey) -> bool {
        match self.records.get(key) {
            Some(record) if record.withdrawn => {
                self.records.remove(key);
                debug!(offer = %key, "inbound offer released");
                true
            }
            Some(_) => {
                warn!(offer = %key, "offer released but not withdrawn");
                false
            }
            None => {
                warn!(offer = %key, "released unknown offer");
                false
            }
        }
    }

    /// The consuming wish was deleted after undeploying. Clears `deployed`
    /// and returns true when the record is now releasable (`withdrawn`
    /// holds).
    pub fn undeploy(&mut self, key: &OfferKey) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.deployed = false;
                record.withdrawn
            }
            None => false,
        }
    }

    /// Answer a wish poll from the current snapshot. Never blocks waiting
    /// for a future offer: an unknown key answers "not withdrawn, no value"
    /// and the caller re-polls.
    pub fn answer(&self, wish: &Wish) -> RemoteOffer {
        let key = OfferKey::of_wish(wish);
        match self.records.get(&key) {
            None => RemoteOffer::unknown(),
            Some(record) if record.withdrawn => RemoteOffer::withdrawn(),
            Some(record) => {
                RemoteOffer::available(record.offer.as_ref().and_then(|o| o.value.clone()))
            }
        }
    }

    /// Look up a record.
    pub fn get(&self, key: &OfferKey) -> Option<&InboundOfferRecord> {
        self.records.get(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
