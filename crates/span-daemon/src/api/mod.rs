//! HTTP API surfaces
//!
//! Two separate routers on two listen addresses: the Deployment service
//! (what peers call) and the Resources service (what local adapters call).

pub mod peer;
pub mod resources;
pub mod state;

pub use peer::deployment_router;
pub use resources::resources_router;
pub use state::AppState;
