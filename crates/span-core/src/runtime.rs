//! The runtime - a single task folding the merged event stream
//!
//! All registry and offer-store mutations happen inside [`Runtime::run`],
//! in arrival order over one `mpsc` channel. RPCs (direct forwards,
//! resends, withdrawal attempts, heartbeat probes) run in spawned tasks and
//! re-enter the fold as events, so per-key ordering matches call order and
//! the maps need no locks.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use span_client::PeerClient;
use span_types::{DeploymentOffer, Offer, OfferKey, Remote, RemoteOffer, Wish};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::event::Event;
use crate::heartbeat;
use crate::inbound::InboundOfferStore;
use crate::outbound::OutboundOfferStore;
use crate::registry::RemoteRegistry;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// This deployment's identity; the `origin` on every outbound wire offer
    pub deployment_id: String,

    /// Cadence of heartbeat rounds
    pub heartbeat_interval: Duration,

    /// Per-call bound on each heartbeat probe
    pub rpc_timeout: Duration,
}

/// A parked withdrawal: the deleteOffer caller's callback plus whether an
/// attempt is currently in flight.
#[derive(Debug)]
struct PendingWithdrawal {
    done: oneshot::Sender<CoreResult<()>>,
    in_flight: bool,
}

/// The event-fold task. Create with [`Runtime::new`], then drive with
/// [`Runtime::run`] (usually in a spawned task) while callers interact
/// through the [`Handle`].
pub struct Runtime {
    config: RuntimeConfig,
    rx: mpsc::Receiver<Event>,
    /// Re-injection sender for spawned tasks; weak so the loop still ends
    /// once every external handle is gone
    tx: mpsc::WeakSender<Event>,

    registry: RemoteRegistry,
    /// Success set of the newest applied heartbeat round
    connected: HashSet<String>,
    /// Sequence number handed to the most recently issued round
    round_issued: u64,
    /// Sequence number of the newest round folded into `connected`; a slow
    /// round finishing behind a faster successor is dropped as stale
    round_applied: u64,
    outbound: OutboundOfferStore,
    inbound: InboundOfferStore,

    pending_withdrawals: HashMap<OfferKey, PendingWithdrawal>,
    pending_releases: HashMap<OfferKey, Vec<oneshot::Sender<()>>>,
    initialized: bool,

    state_tx: watch::Sender<u64>,
}

/// Cloneable handle feeding events into the runtime.
///
/// Operations that the protocol acknowledges late (`withdraw_offer`,
/// `peer_release`) resolve only once the corresponding handshake completes.
#[derive(Debug, Clone)]
pub struct Handle {
    tx: mpsc::Sender<Event>,
    state_rx: watch::Receiver<u64>,
}

impl Runtime {
    /// Create a runtime and its handle.
    pub fn new(config: RuntimeConfig) -> (Self, Handle) {
        let (tx, rx) = mpsc::channel(256);
        let (state_tx, state_rx) = watch::channel(0);

        let runtime = Self {
            registry: RemoteRegistry::new(config.rpc_timeout),
            config,
            rx,
            tx: tx.downgrade(),
            connected: HashSet::new(),
            round_issued: 0,
            round_applied: 0,
            outbound: OutboundOfferStore::new(),
            inbound: InboundOfferStore::new(),
            pending_withdrawals: HashMap::new(),
            pending_releases: HashMap::new(),
            initialized: false,
            state_tx,
        };

        (runtime, Handle { tx, state_rx })
    }

    /// Run the fold until every handle is dropped.
    ///
    /// Stopping drops all connections and parked acknowledgements; in-flight
    /// RPCs are left to complete and their outcomes discarded.
    pub async fn run(mut self) {
        info!(deployment = %self.config.deployment_id, "runtime started");

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick is immediate; skip it so a round only runs after
        // one full interval
        heartbeat.tick().await;

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = heartbeat.tick() => self.start_heartbeat_round(),
            }
        }

        info!(deployment = %self.config.deployment_id, "runtime stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::RemoteUpserted { remote, refresh } => {
                self.registry.upsert(remote, refresh);
            }
            Event::RemoteDeleted { id } => {
                self.registry.remove(&id);
                self.connected.remove(&id);
            }
            Event::OfferUpserted { offer, refresh } => self.on_offer_upserted(offer, refresh),
            Event::OfferWithdrawn { key, done } => self.on_offer_withdrawn(key, done),
            Event::PeerOffer { offer } => self.on_peer_offer(offer),
            Event::PeerRelease { offer, ack } => self.on_peer_release(offer, ack),
            Event::WishPolled { wish, reply } => self.on_wish_polled(wish, reply),
            Event::WishDeleted { wish } => self.on_wish_deleted(wish),
            Event::HeartbeatRound { seq, alive } => self.on_heartbeat_round(seq, alive),
            Event::WithdrawalOutcome { key, result } => self.on_withdrawal_outcome(key, result),
            Event::Initialized => self.on_initialized(),
        }
    }

    // ========== Outbound offers ==========

    fn on_offer_upserted(&mut self, offer: Offer, refresh: bool) {
        let key = OfferKey::of_offer(&offer);
        if refresh {
            debug!(offer = %key, "offer refreshed");
        } else {
            info!(offer = %key, "offer updated");
        }

        // direct-forward once if the beneficiary is a known remote; any
        // failure is recovered by resend-on-reconnect, never retried here
        if let Some(client) = self.registry.client(&offer.beneficiary_id) {
            let wire = self.wire_offer(&offer);
            let key = key.clone();
            tokio::spawn(async move {
                match client.offer(&wire).await {
                    Ok(()) => debug!(offer = %key, "offer forwarded"),
                    Err(e) => {
                        debug!(offer = %key, error = %e, "offer forward failed; will resend on reconnect")
                    }
                }
            });
        } else {
            debug!(
                offer = %key,
                beneficiary = %offer.beneficiary_id,
                "beneficiary not registered; offer stored only"
            );
        }

        self.outbound.upsert(offer);
    }

    fn on_offer_withdrawn(&mut self, key: OfferKey, done: oneshot::Sender<CoreResult<()>>) {
        if !self.outbound.contains(&key) {
            // store fold: withdrawing an unknown offer is a warned no-op
            self.outbound.remove(&key);
            let _ = done.send(Ok(()));
            return;
        }
        if self.pending_withdrawals.contains_key(&key) {
            warn!(offer = %key, "withdrawal already pending");
            let _ = done.send(Err(CoreError::WithdrawalPending(key)));
            return;
        }

        info!(offer = %key, "offer withdrawal requested");
        self.pending_withdrawals.insert(
            key.clone(),
            PendingWithdrawal {
                done,
                in_flight: false,
            },
        );
        self.attempt_withdrawal(&key);
    }

    /// One iteration of the withdrawal retry loop: send `releaseOffer` if
    /// the beneficiary is connected, otherwise wait for its next connect
    /// edge.
    fn attempt_withdrawal(&mut self, key: &OfferKey) {
        let Some(pending) = self.pending_withdrawals.get_mut(key) else {
            return;
        };
        if pending.in_flight {
            return;
        }

        let beneficiary = &key.deployment;
        let client = if self.connected.contains(beneficiary) {
            self.registry.client(beneficiary)
        } else {
            None
        };

        match client {
            Some(client) => {
                pending.in_flight = true;
                let wire = DeploymentOffer::withdrawn(
                    self.config.deployment_id.clone(),
                    key.name.clone(),
                );
                let key = key.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = client.release_offer(&wire).await;
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(Event::WithdrawalOutcome { key, result }).await;
                    }
                });
            }
            None => {
                info!(
                    offer = %key,
                    beneficiary = %beneficiary,
                    "beneficiary not connected; waiting for reconnect to withdraw"
                );
            }
        }
    }

    fn on_withdrawal_outcome(
        &mut self,
        key: OfferKey,
        result: Result<(), span_client::ClientError>,
    ) {
        if let Err(e) = &result {
            if e.is_unavailable() {
                if let Some(pending) = self.pending_withdrawals.get_mut(&key) {
                    pending.in_flight = false;
                    info!(offer = %key, error = %e, "beneficiary unavailable; waiting for reconnect");
                }
                return;
            }
        }

        let Some(pending) = self.pending_withdrawals.remove(&key) else {
            debug!(offer = %key, "stale withdrawal outcome ignored");
            return;
        };
        match result {
            Ok(()) => {
                // the only path that removes an outbound map entry
                self.outbound.remove(&key);
                info!(offer = %key, "offer withdrawn; beneficiary acknowledged");
                let _ = pending.done.send(Ok(()));
            }
            Err(e) => {
                warn!(offer = %key, error = %e, "withdrawal rejected; giving up");
                let _ = pending
                    .done
                    .send(Err(CoreError::WithdrawalFailed { key, source: e }));
            }
        }
    }

    // ========== Inbound offers ==========

    fn on_peer_offer(&mut self, offer: DeploymentOffer) {
        let key = OfferKey::of_inbound(&offer);
        info!(offer = %key, "offer received");
        self.inbound.upsert(offer);
        self.bump_state();
    }

    fn on_peer_release(&mut self, offer: DeploymentOffer, ack: oneshot::Sender<()>) {
        let key = OfferKey::of_inbound(&offer);
        info!(offer = %key, "release requested by origin");
        self.inbound.withdraw(&key);
        self.bump_state();
        self.pending_releases.entry(key.clone()).or_default().push(ack);
        self.try_release(&key);
    }

    /// Complete the release handshake for a key if its record has
    /// undeployed and the initialization gate is open.
    fn try_release(&mut self, key: &OfferKey) {
        if !self.initialized {
            debug!(offer = %key, "release deferred until first provisioning round");
            return;
        }

        let releasable = match self.inbound.get(key) {
            // withdraw always creates the record, but guard anyway: with no
            // record there is nothing to hold the ack for
            None => true,
            Some(record) => record.withdrawn && !record.deployed,
        };
        if !releasable {
            return;
        }

        if self.inbound.get(key).is_some() && self.inbound.release(key) {
            self.bump_state();
        }
        if let Some(acks) = self.pending_releases.remove(key) {
            info!(offer = %key, acks = acks.len(), "release acknowledged");
            for ack in acks {
                let _ = ack.send(());
            }
        }
    }

    fn on_wish_polled(&mut self, wish: Wish, reply: oneshot::Sender<RemoteOffer>) {
        let key = OfferKey::of_wish(&wish);
        let answer = self.inbound.answer(&wish);
        debug!(
            wish = %key,
            is_deployed = wish.is_deployed,
            is_withdrawn = answer.is_withdrawn,
            "wish polled"
        );

        if wish.is_deployed {
            self.inbound.poll_deployed(&key);
        } else {
            self.inbound.poll_undeployed(&key);
        }

        let _ = reply.send(answer);
    }

    fn on_wish_deleted(&mut self, wish: Wish) {
        let key = OfferKey::of_wish(&wish);
        if wish.is_deployed {
            // releasing now would let the origin destroy a resource the
            // consumer still has materialized
            warn!(wish = %key, "wish deleted while still deployed; keeping record deployed");
            return;
        }

        info!(wish = %key, "wish deleted");
        if self.inbound.undeploy(&key) {
            self.try_release(&key);
        }
    }

    // ========== Liveness ==========

    fn start_heartbeat_round(&mut self) {
        let clients = self.registry.clients();
        if clients.is_empty() {
            return;
        }

        self.round_issued += 1;
        let seq = self.round_issued;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let alive = heartbeat::run_round(clients).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Event::HeartbeatRound { seq, alive }).await;
            }
        });
    }

    fn on_heartbeat_round(&mut self, seq: u64, alive: HashSet<String>) {
        // rounds run concurrently when a probe outlives the interval; a
        // result arriving behind a newer round must not roll `connected`
        // back and fake a disconnect/reconnect
        if seq <= self.round_applied {
            debug!(seq, newest = self.round_applied, "stale heartbeat round dropped");
            return;
        }
        self.round_applied = seq;

        // a remote deleted mid-round must not produce an edge
        let current: HashSet<String> = alive
            .into_iter()
            .filter(|id| self.registry.contains(id))
            .collect();

        let edges = heartbeat::connect_edges(&self.connected, &current);
        self.connected = current;

        for id in edges {
            self.on_remote_connected(&id);
        }
    }

    fn on_remote_connected(&mut self, id: &str) {
        info!(remote = %id, "remote connected");

        // resend every stored offer addressed to this beneficiary,
        // sequentially; individual failures do not abort the rest. Offers
        // with a withdrawal in flight are skipped: re-advertising one could
        // land after the retried releaseOffer and undo the withdrawal
        let offers: Vec<Offer> = self
            .outbound
            .offers_for(id)
            .into_iter()
            .filter(|o| !self.pending_withdrawals.contains_key(&OfferKey::of_offer(o)))
            .collect();
        if !offers.is_empty() {
            if let Some(client) = self.registry.client(id) {
                let wire: Vec<(OfferKey, DeploymentOffer)> = offers
                    .iter()
                    .map(|o| (OfferKey::of_offer(o), self.wire_offer(o)))
                    .collect();
                tokio::spawn(async move {
                    for (key, offer) in wire {
                        match client.offer(&offer).await {
                            Ok(()) => debug!(offer = %key, "offer resent"),
                            Err(e) => debug!(offer = %key, error = %e, "offer resend failed"),
                        }
                    }
                });
            }
        }

        // retry every parked withdrawal addressed to this beneficiary
        let keys: Vec<OfferKey> = self
            .pending_withdrawals
            .keys()
            .filter(|k| k.deployment == id)
            .cloned()
            .collect();
        for key in keys {
            self.attempt_withdrawal(&key);
        }
    }

    // ========== Gating & signals ==========

    fn on_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        info!("first provisioning round complete; release gate open");

        let keys: Vec<OfferKey> = self.pending_releases.keys().cloned().collect();
        for key in keys {
            self.try_release(&key);
        }
    }

    fn bump_state(&mut self) {
        self.state_tx.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn wire_offer(&self, offer: &Offer) -> DeploymentOffer {
        DeploymentOffer::new(
            self.config.deployment_id.clone(),
            offer.name.clone(),
            offer.value.clone(),
        )
    }
}

impl Handle {
    /// Register or update a remote.
    pub async fn upsert_remote(&self, remote: Remote, refresh: bool) -> CoreResult<()> {
        self.send(Event::RemoteUpserted { remote, refresh }).await
    }

    /// Remove a remote.
    pub async fn delete_remote(&self, id: impl Into<String>) -> CoreResult<()> {
        self.send(Event::RemoteDeleted { id: id.into() }).await
    }

    /// Publish or update an outbound offer.
    pub async fn upsert_offer(&self, offer: Offer, refresh: bool) -> CoreResult<()> {
        self.send(Event::OfferUpserted { offer, refresh }).await
    }

    /// Withdraw an outbound offer. Resolves once the beneficiary has
    /// acknowledged the withdrawal, or fails with the permanent error.
    pub async fn withdraw_offer(&self, key: OfferKey) -> CoreResult<()> {
        let (done, done_rx) = oneshot::channel();
        self.send(Event::OfferWithdrawn { key, done }).await?;
        done_rx.await.map_err(|_| CoreError::Stopped)?
    }

    /// Ingest an offer forwarded by a peer.
    pub async fn peer_offer(&self, offer: DeploymentOffer) -> CoreResult<()> {
        self.send(Event::PeerOffer { offer }).await
    }

    /// Ingest a peer's release request. Resolves once the dependent wish
    /// has undeployed and the release gate is open.
    pub async fn peer_release(&self, offer: DeploymentOffer) -> CoreResult<()> {
        let (ack, ack_rx) = oneshot::channel();
        self.send(Event::PeerRelease { offer, ack }).await?;
        ack_rx.await.map_err(|_| CoreError::Stopped)
    }

    /// Answer a wish poll from the current inbound snapshot.
    pub async fn poll_wish(&self, wish: Wish) -> CoreResult<RemoteOffer> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(Event::WishPolled { wish, reply }).await?;
        reply_rx.await.map_err(|_| CoreError::Stopped)
    }

    /// Report a deleted wish.
    pub async fn wish_deleted(&self, wish: Wish) -> CoreResult<()> {
        self.send(Event::WishDeleted { wish }).await
    }

    /// Open the release gate after the first provisioning round.
    pub async fn initialized(&self) -> CoreResult<()> {
        self.send(Event::Initialized).await
    }

    /// Watch the state-change counter driving the action scheduler.
    pub fn state_changes(&self) -> watch::Receiver<u64> {
        self.state_rx.clone()
    }

    async fn send(&self, event: Event) -> CoreResult<()> {
        self.tx.send(event).await.map_err(|_| CoreError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{sleep, Duration};

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            deployment_id: "b".to_string(),
            // long interval: no heartbeat traffic during these tests
            heartbeat_interval: Duration::from_secs(3600),
            rpc_timeout: Duration::from_secs(1),
        }
    }

    fn spawn_runtime() -> Handle {
        let (runtime, handle) = Runtime::new(test_config());
        tokio::spawn(runtime.run());
        handle
    }

    #[tokio::test]
    async fn test_wish_poll_lifecycle() {
        let handle = spawn_runtime();
        let wish = Wish::new("a", "bucket", false);

        // before any offer: unknown, re-pollable
        let answer = handle.poll_wish(wish.clone()).await.unwrap();
        assert_eq!(answer, RemoteOffer::unknown());

        // offer arrives
        handle
            .peer_offer(DeploymentOffer::new("a", "bucket", json!("arn:1")))
            .await
            .unwrap();
        let answer = handle.poll_wish(wish.clone()).await.unwrap();
        assert_eq!(answer, RemoteOffer::available(Some(json!("arn:1"))));

        // polls are idempotent without intervening events
        let again = handle.poll_wish(wish).await.unwrap();
        assert_eq!(answer, again);
    }

    #[tokio::test]
    async fn test_release_ack_waits_for_undeploy_and_gate() {
        let handle = spawn_runtime();

        handle
            .peer_offer(DeploymentOffer::new("a", "bucket", json!("arn:1")))
            .await
            .unwrap();
        // consumer reports the wish materialized
        handle
            .poll_wish(Wish::new("a", "bucket", true))
            .await
            .unwrap();

        // the origin asks for release; the ack must hang
        let release_handle = handle.clone();
        let release = tokio::spawn(async move {
            release_handle
                .peer_release(DeploymentOffer::withdrawn("a", "bucket"))
                .await
        });
        sleep(Duration::from_millis(100)).await;
        assert!(!release.is_finished());

        // next poll reports withdrawn
        let answer = handle.poll_wish(Wish::new("a", "bucket", true)).await.unwrap();
        assert_eq!(answer, RemoteOffer::withdrawn());

        // wish deleted, but the gate is still closed
        handle
            .wish_deleted(Wish::new("a", "bucket", false))
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(!release.is_finished());

        // gate opens: the ack fires
        handle.initialized().await.unwrap();
        release.await.unwrap().unwrap();

        // fully released: the record is gone
        let answer = handle.poll_wish(Wish::new("a", "bucket", false)).await.unwrap();
        assert_eq!(answer, RemoteOffer::unknown());
    }

    #[tokio::test]
    async fn test_release_ack_immediate_when_undeployed_and_initialized() {
        let handle = spawn_runtime();
        handle.initialized().await.unwrap();

        handle
            .peer_offer(DeploymentOffer::new("a", "bucket", json!("arn:1")))
            .await
            .unwrap();

        // never deployed: the ack resolves without waiting
        handle
            .peer_release(DeploymentOffer::withdrawn("a", "bucket"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_withdraw_unknown_offer_resolves_immediately() {
        let handle = spawn_runtime();
        handle
            .withdraw_offer(OfferKey::new("c", "ghost"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_withdraw_waits_for_disconnected_beneficiary() {
        let handle = spawn_runtime();
        handle
            .upsert_offer(Offer::new("c", "bucket", json!("arn:1")), false)
            .await
            .unwrap();

        let withdraw_handle = handle.clone();
        let withdraw = tokio::spawn(async move {
            withdraw_handle
                .withdraw_offer(OfferKey::new("c", "bucket"))
                .await
        });
        sleep(Duration::from_millis(100)).await;

        // beneficiary unknown and disconnected: the callback stays parked
        assert!(!withdraw.is_finished());
        withdraw.abort();
    }

    #[tokio::test]
    async fn test_duplicate_withdrawal_is_rejected() {
        let handle = spawn_runtime();
        handle
            .upsert_offer(Offer::new("c", "bucket", json!("arn:1")), false)
            .await
            .unwrap();

        let first_handle = handle.clone();
        let first = tokio::spawn(async move {
            first_handle.withdraw_offer(OfferKey::new("c", "bucket")).await
        });
        sleep(Duration::from_millis(50)).await;

        let second = handle.withdraw_offer(OfferKey::new("c", "bucket")).await;
        assert!(matches!(second, Err(CoreError::WithdrawalPending(_))));
        first.abort();
    }

    #[tokio::test]
    async fn test_slow_heartbeat_round_cannot_fake_a_reconnect() {
        let (mut runtime, _handle) = Runtime::new(test_config());
        runtime
            .registry
            .upsert(Remote::new("b", "127.0.0.1", 7423), false);
        let alive: HashSet<String> = ["b".to_string()].into_iter().collect();

        // round 2 finishes first and connects b
        runtime.handle_event(Event::HeartbeatRound {
            seq: 2,
            alive: alive.clone(),
        });
        assert!(runtime.connected.contains("b"));

        // round 1 outlived the interval and finishes late; its empty
        // result must not roll connectivity back
        runtime.handle_event(Event::HeartbeatRound {
            seq: 1,
            alive: HashSet::new(),
        });
        assert!(runtime.connected.contains("b"));
        assert_eq!(runtime.round_applied, 2);

        // the next round finds b where it already was: steady, no edge
        runtime.handle_event(Event::HeartbeatRound { seq: 3, alive });
        assert!(runtime.connected.contains("b"));
        assert_eq!(runtime.round_applied, 3);
    }

    #[tokio::test]
    async fn test_state_counter_tracks_inbound_changes() {
        let handle = spawn_runtime();
        let state = handle.state_changes();
        let before = *state.borrow();

        handle
            .peer_offer(DeploymentOffer::new("a", "bucket", json!("arn:1")))
            .await
            .unwrap();
        // the fold runs asynchronously; give it a moment
        sleep(Duration::from_millis(50)).await;
        assert_ne!(*state.borrow(), before);
    }
}
