//! spand - SPAN deployment daemon
//!
//! Exchanges resource handles with peer deployments: publishes offers,
//! answers wish polls, and schedules deploy/terminate/destroy actions for
//! the managed program.

use clap::Parser;
use span_daemon::config::SpanConfig;
use span_daemon::error::{DaemonError, DaemonResult};
use span_daemon::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SPAN daemon CLI
#[derive(Parser)]
#[command(name = "spand")]
#[command(about = "SPAN daemon - cross-deployment resource handle exchange", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SPAN_CONFIG")]
    config: Option<String>,

    /// This deployment's identity
    #[arg(short, long, env = "SPAN_ID")]
    id: Option<String>,

    /// Peer-facing listen address
    #[arg(long, env = "SPAN_DEPLOYMENT_ADDR")]
    deployment_addr: Option<String>,

    /// Adapter-facing listen address
    #[arg(long, env = "SPAN_RESOURCES_ADDR")]
    resources_addr: Option<String>,

    /// Log level
    #[arg(long, env = "SPAN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "SPAN_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = SpanConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // CLI args override file and environment
    if let Some(id) = cli.id {
        config.id = id;
    }
    if let Some(addr) = cli.deployment_addr {
        config.deployment_addr = addr
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid deployment address: {}", e)))?;
    }
    if let Some(addr) = cli.resources_addr {
        config.resources_addr = addr
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid resources address: {}", e)))?;
    }

    println!(
        r#"
  ____  ____   _    _   _
 / ___||  _ \ / \  | \ | |
 \___ \| |_) / _ \ |  \| |
  ___) |  __/ ___ \| |\  |
 |____/|_| /_/   \_\_| \_|

  Stack Peering and Negotiation
  Version: {}
  Deployment: {}
  Peers: {}  Adapters: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.id,
        config.deployment_addr,
        config.resources_addr
    );

    let server = Server::new(config)?;
    server.run().await
}
