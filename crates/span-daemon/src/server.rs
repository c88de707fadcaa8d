//! Server setup and lifecycle management

use crate::api::{deployment_router, resources_router, AppState};
use crate::config::SpanConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::program::ShellProgram;
use span_core::{Runtime, RuntimeConfig, Scheduler};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// The spand server: runtime, scheduler, and both HTTP surfaces.
pub struct Server {
    config: SpanConfig,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: SpanConfig) -> DaemonResult<Self> {
        if config.id.is_empty() {
            return Err(DaemonError::Config(
                "deployment id must be set (--id or SPAN_ID)".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Run until the managed program reaches a terminal action.
    pub async fn run(self) -> DaemonResult<()> {
        let (runtime, handle) = Runtime::new(RuntimeConfig {
            deployment_id: self.config.id.clone(),
            heartbeat_interval: self.config.heartbeat_interval(),
            rpc_timeout: self.config.rpc_timeout(),
        });
        let runtime_task = tokio::spawn(runtime.run());

        let (terminate_tx, terminate_rx) = watch::channel(false);
        let (destroy_tx, destroy_rx) = watch::channel(false);
        let destroy_tx = Arc::new(destroy_tx);
        let scheduler = Scheduler::new(handle.state_changes(), terminate_rx, destroy_rx);

        let state = AppState::new(handle.clone(), destroy_tx, self.config.id.clone());

        let deployment_listener = TcpListener::bind(self.config.deployment_addr).await?;
        let resources_listener = TcpListener::bind(self.config.resources_addr).await?;
        info!(
            deployment = %self.config.id,
            addr = %self.config.deployment_addr,
            "deployment service listening"
        );
        info!(addr = %self.config.resources_addr, "resources service listening");

        let deployment_server = tokio::spawn(
            axum::serve(deployment_listener, deployment_router(state.clone())).into_future(),
        );
        let resources_server =
            tokio::spawn(axum::serve(resources_listener, resources_router(state)).into_future());

        // process signals map to the terminate trigger
        tokio::spawn(async move {
            shutdown_signal().await;
            terminate_tx.send_replace(true);
        });

        let mut program = ShellProgram::new(self.config.program.clone());
        let gate = handle.clone();
        let result = scheduler
            .run(&mut program, move || {
                tokio::spawn(async move {
                    let _ = gate.initialized().await;
                });
            })
            .await;

        info!("spand shutting down");
        deployment_server.abort();
        resources_server.abort();
        runtime_task.abort();

        result.map(|_| ()).map_err(DaemonError::Program)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received ctrl-c, terminating");
        }
        _ = terminate => {
            info!("received terminate signal, terminating");
        }
    }
}
