//! End-to-end tests: two daemons exchanging offers over real HTTP.

use serde_json::json;
use span_client::ResourcesClient;
use span_core::{Handle, Runtime, RuntimeConfig};
use span_daemon::api::{deployment_router, resources_router, AppState};
use span_types::{Offer, Remote, RemoteOffer, Wish};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

struct Deployment {
    handle: Handle,
    deployment_addr: SocketAddr,
    resources_addr: SocketAddr,
}

impl Deployment {
    fn resources_client(&self) -> ResourcesClient {
        ResourcesClient::new(&format!("http://{}", self.resources_addr)).unwrap()
    }
}

/// Boot a runtime with both HTTP surfaces on ephemeral ports. A caller may
/// hand in the peer-facing listener to control when it starts accepting.
async fn boot(id: &str, deployment_listener: Option<TcpListener>) -> Deployment {
    let (runtime, handle) = Runtime::new(RuntimeConfig {
        deployment_id: id.to_string(),
        heartbeat_interval: Duration::from_millis(200),
        rpc_timeout: Duration::from_secs(1),
    });
    tokio::spawn(runtime.run());

    let (destroy_tx, _destroy_rx) = watch::channel(false);
    let state = AppState::new(handle.clone(), Arc::new(destroy_tx), id.to_string());

    let deployment_listener = match deployment_listener {
        Some(listener) => listener,
        None => TcpListener::bind("127.0.0.1:0").await.unwrap(),
    };
    let resources_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let deployment_addr = deployment_listener.local_addr().unwrap();
    let resources_addr = resources_listener.local_addr().unwrap();

    tokio::spawn(
        axum::serve(deployment_listener, deployment_router(state.clone())).into_future(),
    );
    tokio::spawn(axum::serve(resources_listener, resources_router(state)).into_future());

    Deployment {
        handle,
        deployment_addr,
        resources_addr,
    }
}

fn remote_for(id: &str, addr: SocketAddr) -> Remote {
    Remote::new(id, addr.ip().to_string(), addr.port())
}

/// Poll a wish through the Resources service until the answer satisfies
/// `check`, or panic after 5s.
async fn poll_until(
    adapter: &ResourcesClient,
    wish: Wish,
    check: impl Fn(&RemoteOffer) -> bool,
) -> RemoteOffer {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let answer = adapter.get_wish(&wish).await.unwrap();
        if check(&answer) {
            return answer;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "wish never reached the expected answer; last: {:?}",
            answer
        );
        sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn test_offer_flows_through_the_resources_service() {
    let a = boot("a", None).await;
    let b = boot("b", None).await;
    let a_adapter = a.resources_client();
    let b_adapter = b.resources_client();

    // adapter registers the remote and publishes an offer, both over HTTP
    a_adapter
        .update_remote(&remote_for("b", b.deployment_addr))
        .await
        .unwrap();
    a_adapter
        .update_offer(&Offer::new("b", "queue", json!("https://queue.example/q1")))
        .await
        .unwrap();

    // the direct forward lands on b; its consumer sees the value
    let answer = poll_until(&b_adapter, Wish::new("a", "queue", false), |a| {
        !a.is_unknown()
    })
    .await;
    assert_eq!(
        answer,
        RemoteOffer::available(Some(json!("https://queue.example/q1")))
    );

    // status endpoint answers on the same surface
    let status: serde_json::Value = reqwest::Client::new()
        .get(format!("http://{}/api/v1/status", b.resources_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["id"], "b");
}

#[tokio::test]
async fn test_offer_resent_when_beneficiary_comes_up() {
    // reserve a port for b, then leave it dark
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b_addr = reserved.local_addr().unwrap();
    drop(reserved);

    let a = boot("a", None).await;
    a.handle
        .upsert_remote(remote_for("b", b_addr), false)
        .await
        .unwrap();
    a.handle
        .upsert_offer(Offer::new("b", "bucket", json!("arn:bucket")), false)
        .await
        .unwrap();

    // the direct forward and the first heartbeats fail silently
    sleep(Duration::from_millis(600)).await;

    // b comes up on the advertised port; the connect edge resends
    let listener = TcpListener::bind(b_addr).await.unwrap();
    let b = boot("b", Some(listener)).await;
    let b_adapter = b.resources_client();

    let answer = poll_until(&b_adapter, Wish::new("a", "bucket", false), |a| {
        !a.is_unknown()
    })
    .await;
    assert_eq!(answer, RemoteOffer::available(Some(json!("arn:bucket"))));
}

#[tokio::test]
async fn test_withdrawal_delivered_when_beneficiary_comes_up() {
    // reserve a port for b, then leave it dark
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let b_addr = reserved.local_addr().unwrap();
    drop(reserved);

    let a = boot("a", None).await;
    let a_adapter = a.resources_client();
    a.handle
        .upsert_remote(remote_for("b", b_addr), false)
        .await
        .unwrap();
    a.handle
        .upsert_offer(Offer::new("b", "queue", json!("url")), false)
        .await
        .unwrap();

    // b is unreachable, so the withdrawal parks waiting for a connect
    let delete = tokio::spawn(async move { a_adapter.delete_offer("b", "queue").await });
    sleep(Duration::from_millis(400)).await;
    assert!(!delete.is_finished());

    // b comes up on the advertised port with nothing deployed and its
    // gate already open; the connect edge retries the withdrawal and b
    // acknowledges, completing the parked delete
    let listener = TcpListener::bind(b_addr).await.unwrap();
    let b = boot("b", Some(listener)).await;
    b.handle.initialized().await.unwrap();

    timeout(Duration::from_secs(5), delete)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // the withdrawn offer was not re-advertised on the same edge
    let answer = b
        .resources_client()
        .get_wish(&Wish::new("a", "queue", false))
        .await
        .unwrap();
    assert!(answer.is_unknown());
}

#[tokio::test]
async fn test_withdrawal_ack_waits_for_consumer_release() {
    let a = boot("a", None).await;
    let b = boot("b", None).await;
    let a_adapter = a.resources_client();
    let b_adapter = b.resources_client();

    a.handle
        .upsert_remote(remote_for("b", b.deployment_addr), false)
        .await
        .unwrap();
    a.handle
        .upsert_offer(Offer::new("b", "queue", json!("url")), false)
        .await
        .unwrap();

    // b's consumer materializes the wish
    poll_until(&b_adapter, Wish::new("a", "queue", true), |a| !a.is_unknown()).await;

    // give a's heartbeat a round to mark b connected
    sleep(Duration::from_millis(500)).await;

    // adapter deletes the offer on a; the call must hang while b still
    // uses it
    let delete = tokio::spawn(async move { a_adapter.delete_offer("b", "queue").await });
    sleep(Duration::from_millis(400)).await;
    assert!(!delete.is_finished());

    // b's consumer sees the withdrawal on its next poll
    poll_until(&b_adapter, Wish::new("a", "queue", true), |a| a.is_withdrawn).await;

    // consumer undeploys and the gate opens; the ack chain completes
    b_adapter
        .wish_deleted(&Wish::new("a", "queue", false))
        .await
        .unwrap();
    b.handle.initialized().await.unwrap();

    timeout(Duration::from_secs(5), delete)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // fully released on both sides
    let answer = b_adapter
        .get_wish(&Wish::new("a", "queue", false))
        .await
        .unwrap();
    assert_eq!(answer, RemoteOffer::unknown());
}
