//! Adapter-facing Resources service
//!
//! The surface the local infrastructure adapters call: remote registration,
//! offer publication and withdrawal, wish polling, and daemon control.
//! deleteOffer responses are held open until the beneficiary acknowledges
//! the withdrawal.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use span_types::{Ack, Offer, OfferKey, Remote, RemoteOffer, Wish};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::state::AppState;
use crate::error::{ApiError, ApiResult};

/// Create the Resources service router
pub fn resources_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/remotes", post(update_remote))
        .route("/remotes", put(refresh_remote))
        .route("/remotes/:id", delete(delete_remote))
        .route("/offers", post(update_offer))
        .route("/offers", put(refresh_offer))
        .route("/offers/:beneficiary/:name", delete(delete_offer))
        .route("/wishes/poll", post(poll_wish))
        .route("/wishes/deleted", post(wish_deleted))
        .route("/status", get(daemon_status))
        .route("/destroy", post(destroy));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Daemon status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    pub version: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub uptime_secs: i64,
}

/// POST /api/v1/remotes - register or update a remote deployment
async fn update_remote(
    State(state): State<AppState>,
    Json(remote): Json<Remote>,
) -> ApiResult<Json<Ack>> {
    validate_remote(&remote)?;
    state.handle.upsert_remote(remote, false).await?;
    Ok(Json(Ack::default()))
}

/// PUT /api/v1/remotes - re-assert a remote after adapter refresh
async fn refresh_remote(
    State(state): State<AppState>,
    Json(remote): Json<Remote>,
) -> ApiResult<Json<Ack>> {
    validate_remote(&remote)?;
    state.handle.upsert_remote(remote, true).await?;
    Ok(Json(Ack::default()))
}

/// DELETE /api/v1/remotes/:id
async fn delete_remote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.handle.delete_remote(id).await?;
    Ok(Json(Ack::default()))
}

/// POST /api/v1/offers - publish or update an offer
async fn update_offer(
    State(state): State<AppState>,
    Json(offer): Json<Offer>,
) -> ApiResult<Json<Ack>> {
    validate_offer(&offer)?;
    state.handle.upsert_offer(offer, false).await?;
    Ok(Json(Ack::default()))
}

/// PUT /api/v1/offers - re-assert an offer after adapter refresh
async fn refresh_offer(
    State(state): State<AppState>,
    Json(offer): Json<Offer>,
) -> ApiResult<Json<Ack>> {
    validate_offer(&offer)?;
    state.handle.upsert_offer(offer, true).await?;
    Ok(Json(Ack::default()))
}

/// DELETE /api/v1/offers/:beneficiary/:name - withdraw an offer; the
/// response is withheld until the beneficiary acknowledges
async fn delete_offer(
    State(state): State<AppState>,
    Path((beneficiary, name)): Path<(String, String)>,
) -> ApiResult<Json<Ack>> {
    state
        .handle
        .withdraw_offer(OfferKey::new(beneficiary, name))
        .await?;
    Ok(Json(Ack::default()))
}

/// POST /api/v1/wishes/poll - answer from the inbound snapshot
async fn poll_wish(
    State(state): State<AppState>,
    Json(wish): Json<Wish>,
) -> ApiResult<Json<RemoteOffer>> {
    let answer = state.handle.poll_wish(wish).await?;
    Ok(Json(answer))
}

/// POST /api/v1/wishes/deleted
async fn wish_deleted(
    State(state): State<AppState>,
    Json(wish): Json<Wish>,
) -> ApiResult<Json<Ack>> {
    state.handle.wish_deleted(wish).await?;
    Ok(Json(Ack::default()))
}

/// GET /api/v1/status
async fn daemon_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let now = chrono::Utc::now();
    Json(StatusResponse {
        id: state.deployment_id.clone(),
        version: state.version.clone(),
        started_at: state.started_at,
        uptime_secs: (now - state.started_at).num_seconds(),
    })
}

/// POST /api/v1/destroy - request teardown of this deployment
async fn destroy(State(state): State<AppState>) -> Json<Ack> {
    info!("destroy requested");
    state.destroy_tx.send_replace(true);
    Json(Ack::default())
}

fn validate_remote(remote: &Remote) -> ApiResult<()> {
    if remote.id.is_empty() {
        return Err(ApiError::BadRequest("remote id must not be empty".into()));
    }
    if remote.host.is_empty() {
        return Err(ApiError::BadRequest("remote host must not be empty".into()));
    }
    Ok(())
}

fn validate_offer(offer: &Offer) -> ApiResult<()> {
    if offer.beneficiary_id.is_empty() || offer.name.is_empty() {
        return Err(ApiError::BadRequest(
            "offer beneficiary and name must not be empty".into(),
        ));
    }
    Ok(())
}
