//! Peer-facing Deployment service
//!
//! The surface other deployments call: offer delivery, offer release, and
//! heartbeat. Release responses are held open until the dependent wish has
//! undeployed, so peer clients must not time these calls out.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use span_types::{Ack, DeploymentOffer, HeartbeatResponse};
use tower_http::trace::TraceLayer;

use super::state::AppState;
use crate::error::ApiResult;

/// Create the Deployment service router
pub fn deployment_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/offers", post(receive_offer))
        .route("/offers/release", post(release_offer))
        .route("/heartbeat", get(heartbeat));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /api/v1/offers - accept an offer from its origin
async fn receive_offer(
    State(state): State<AppState>,
    Json(offer): Json<DeploymentOffer>,
) -> ApiResult<Json<Ack>> {
    state.handle.peer_offer(offer).await?;
    Ok(Json(Ack::default()))
}

/// POST /api/v1/offers/release - origin requests release; the response is
/// withheld until this deployment no longer uses the offer
async fn release_offer(
    State(state): State<AppState>,
    Json(offer): Json<DeploymentOffer>,
) -> ApiResult<Json<Ack>> {
    state.handle.peer_release(offer).await?;
    Ok(Json(Ack::default()))
}

/// GET /api/v1/heartbeat - liveness probe, answers with this deployment's id
async fn heartbeat(State(state): State<AppState>) -> Json<HeartbeatResponse> {
    Json(HeartbeatResponse {
        id: state.deployment_id.clone(),
    })
}
