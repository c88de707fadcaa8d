//! Application state for API handlers

use span_core::Handle;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Runtime handle
    pub handle: Handle,

    /// Destroy trigger for the action scheduler
    pub destroy_tx: Arc<watch::Sender<bool>>,

    /// This deployment's identity
    pub deployment_id: String,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        handle: Handle,
        destroy_tx: Arc<watch::Sender<bool>>,
        deployment_id: String,
    ) -> Self {
        Self {
            handle,
            destroy_tx,
            deployment_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }
}
