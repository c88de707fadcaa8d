//! Events folded by the runtime
//!
//! Every external stimulus - RPC handler calls, heartbeat rounds, spawned
//! RPC completions - enters the runtime as one of these events, giving a
//! single ordered stream over all state mutations.

use std::collections::HashSet;

use span_client::ClientError;
use span_types::{DeploymentOffer, Offer, OfferKey, Remote, RemoteOffer, Wish};
use tokio::sync::oneshot;

use crate::error::CoreError;

/// One event in the merged stream.
#[derive(Debug)]
pub enum Event {
    /// A remote was registered or its endpoint updated
    RemoteUpserted {
        remote: Remote,
        /// True for adapter refreshes (logged quieter)
        refresh: bool,
    },

    /// A remote was removed
    RemoteDeleted { id: String },

    /// A local offer was published or updated
    OfferUpserted {
        offer: Offer,
        /// True for adapter refreshes (logged quieter)
        refresh: bool,
    },

    /// A local offer was withdrawn; `done` fires once the withdrawal
    /// protocol completes (or fails permanently)
    OfferWithdrawn {
        key: OfferKey,
        done: oneshot::Sender<Result<(), CoreError>>,
    },

    /// A peer forwarded an offer to this deployment
    PeerOffer { offer: DeploymentOffer },

    /// A peer asked this deployment to release one of its offers; `ack` is
    /// withheld until the release protocol completes
    PeerRelease {
        offer: DeploymentOffer,
        ack: oneshot::Sender<()>,
    },

    /// The local provisioning program polled a wish
    WishPolled {
        wish: Wish,
        reply: oneshot::Sender<RemoteOffer>,
    },

    /// The local provisioning program deleted a wish
    WishDeleted { wish: Wish },

    /// A heartbeat round completed; `alive` is the set of remote ids that
    /// answered within the per-call timeout. `seq` orders rounds by issue
    /// time: results arriving behind a newer round are stale and dropped
    HeartbeatRound { seq: u64, alive: HashSet<String> },

    /// A spawned withdrawal attempt finished
    WithdrawalOutcome {
        key: OfferKey,
        result: Result<(), ClientError>,
    },

    /// The first provisioning round completed; opens the release gate
    Initialized,
}
