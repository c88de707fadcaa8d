//! Client for a remote deployment's Deployment service

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use span_types::{Ack, DeploymentOffer, HeartbeatResponse, Remote};

use crate::error::{ClientError, ClientResult};

/// RPC client bound to one remote deployment's `(host, port)`.
///
/// This is the core's `Connection`: exclusively owned by the remote
/// registry, rebuilt whenever the remote's endpoint changes. Offer and
/// release calls carry no timeout - release acks are withheld by the peer
/// until its release protocol completes, which can legitimately take a long
/// time. Heartbeats are bounded by a per-call timeout.
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: Client,
    base_url: String,
    heartbeat_timeout: Duration,
}

impl PeerClient {
    /// Create a client for the given remote.
    pub fn new(remote: &Remote, heartbeat_timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", remote.host, remote.port),
            heartbeat_timeout,
        })
    }

    /// The endpoint this client is bound to.
    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    /// Forward an offer to the remote.
    pub async fn offer(&self, offer: &DeploymentOffer) -> ClientResult<()> {
        let _: Ack = self.post("/api/v1/offers", offer).await?;
        Ok(())
    }

    /// Ask the remote to release an offer it received from us.
    ///
    /// The remote withholds the acknowledgement until the dependent wish has
    /// undeployed, so this call may block for a long time.
    pub async fn release_offer(&self, offer: &DeploymentOffer) -> ClientResult<()> {
        let _: Ack = self.post("/api/v1/offers/release", offer).await?;
        Ok(())
    }

    /// Probe the remote for liveness, bounded by the per-call timeout.
    pub async fn heartbeat(&self) -> ClientResult<HeartbeatResponse> {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.heartbeat_timeout)
            .send()
            .await?;
        handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        handle_response(response).await
    }
}

/// Map an HTTP response to a typed result, surfacing non-2xx statuses as
/// service errors.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ClientResult<T> {
    let status = response.status();

    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_format() {
        let remote = Remote::new("prod-eu", "10.0.0.1", 7423);
        let client = PeerClient::new(&remote, Duration::from_secs(2)).unwrap();
        assert_eq!(client.endpoint(), "http://10.0.0.1:7423");
    }
}
