//! Configuration for span-daemon

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanConfig {
    /// This deployment's identity, sent as the origin on every outbound
    /// offer and in heartbeat responses
    #[serde(default)]
    pub id: String,

    /// Peer-facing listen address
    #[serde(default = "default_deployment_addr")]
    pub deployment_addr: SocketAddr,

    /// Adapter-facing listen address
    #[serde(default = "default_resources_addr")]
    pub resources_addr: SocketAddr,

    /// Seconds between heartbeat rounds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Per-call RPC timeout in seconds; bounds each heartbeat probe, so
    /// keep it at or below the heartbeat interval
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Apply-program commands
    #[serde(default)]
    pub program: ProgramConfig,
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            deployment_addr: default_deployment_addr(),
            resources_addr: default_resources_addr(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            rpc_timeout_secs: default_rpc_timeout(),
            logging: LoggingConfig::default(),
            program: ProgramConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Shell commands for the managed program.
///
/// Each command receives the current state as JSON on stdin and prints the
/// next state as JSON on stdout. Unset commands pass state through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub deploy: Option<String>,
    pub terminate: Option<String>,
    pub destroy: Option<String>,
}

fn default_deployment_addr() -> SocketAddr {
    "127.0.0.1:7423".parse().unwrap()
}

fn default_resources_addr() -> SocketAddr {
    "127.0.0.1:7424".parse().unwrap()
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_rpc_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SpanConfig {
    /// Load configuration from defaults, an optional file, and `SPAN_*`
    /// environment variables, in increasing precedence.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SpanConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SPAN")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SpanConfig::default();
        assert_eq!(config.deployment_addr.port(), 7423);
        assert_eq!(config.resources_addr.port(), 7424);
        assert_eq!(config.heartbeat_interval_secs, 5);
        assert!(config.program.deploy.is_none());
    }

    #[test]
    fn test_load_without_file() {
        let config = SpanConfig::load(None).unwrap();
        assert_eq!(config.rpc_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_timeout_within_heartbeat_interval() {
        // a probe outliving the interval would overlap the next round
        let config = SpanConfig::default();
        assert!(config.rpc_timeout_secs <= config.heartbeat_interval_secs);
    }
}
