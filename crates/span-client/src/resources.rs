//! Client for a deployment's own Resources service
//!
//! Provisioning adapters use this client to report remote and offer
//! lifecycle from their declarative-resource shims and to poll wishes.

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use span_types::{Ack, Offer, Remote, RemoteOffer, Wish};

use crate::error::ClientResult;
use crate::peer::handle_response;

/// RPC client for the local Resources service.
///
/// No client-level timeout: `delete_offer` blocks until the withdrawal
/// protocol completes, which waits for the beneficiary to acknowledge.
#[derive(Debug, Clone)]
pub struct ResourcesClient {
    client: Client,
    base_url: String,
}

impl ResourcesClient {
    /// Create a client for the Resources service at `endpoint`.
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    // ========== Remote lifecycle ==========

    /// Register or update a remote deployment.
    pub async fn update_remote(&self, remote: &Remote) -> ClientResult<()> {
        let _: Ack = self.post("/api/v1/remotes", remote).await?;
        Ok(())
    }

    /// Re-assert a remote after an adapter refresh.
    pub async fn refresh_remote(&self, remote: &Remote) -> ClientResult<()> {
        let _: Ack = self.put("/api/v1/remotes", remote).await?;
        Ok(())
    }

    /// Remove a remote deployment.
    pub async fn delete_remote(&self, remote: &Remote) -> ClientResult<()> {
        let _: Ack = self.delete(&format!("/api/v1/remotes/{}", remote.id)).await?;
        Ok(())
    }

    // ========== Offer lifecycle ==========

    /// Publish or update an outbound offer.
    pub async fn update_offer(&self, offer: &Offer) -> ClientResult<()> {
        let _: Ack = self.post("/api/v1/offers", offer).await?;
        Ok(())
    }

    /// Re-assert an outbound offer after an adapter refresh.
    pub async fn refresh_offer(&self, offer: &Offer) -> ClientResult<()> {
        let _: Ack = self.put("/api/v1/offers", offer).await?;
        Ok(())
    }

    /// Withdraw an outbound offer.
    ///
    /// The acknowledgement is withheld until the beneficiary has accepted
    /// the withdrawal, so this call may block until the beneficiary
    /// reconnects.
    pub async fn delete_offer(&self, beneficiary_id: &str, name: &str) -> ClientResult<()> {
        let _: Ack = self
            .delete(&format!("/api/v1/offers/{}/{}", beneficiary_id, name))
            .await?;
        Ok(())
    }

    // ========== Wishes ==========

    /// Ask whether a wish is currently satisfied.
    pub async fn get_wish(&self, wish: &Wish) -> ClientResult<RemoteOffer> {
        self.post("/api/v1/wishes/poll", wish).await
    }

    /// Report that a wish was deleted from the provisioning program.
    pub async fn wish_deleted(&self, wish: &Wish) -> ClientResult<()> {
        let _: Ack = self.post("/api/v1/wishes/deleted", wish).await?;
        Ok(())
    }

    // ========== Lifecycle triggers ==========

    /// Request teardown of this deployment's provisioned resources.
    pub async fn destroy(&self) -> ClientResult<()> {
        let _: Ack = self
            .post("/api/v1/destroy", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    // ========== Internal HTTP helpers ==========

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        handle_response(response).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.put(&url).json(body).send().await?;
        handle_response(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.delete(&url).send().await?;
        handle_response(response).await
    }
}
