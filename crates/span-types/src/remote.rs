//! Remote deployment descriptors and generic RPC acknowledgements

use serde::{Deserialize, Serialize};

/// A known peer deployment and where to reach its Deployment service.
///
/// Identity is `id`; `host`/`port` describe the current RPC endpoint. The
/// remote registry rebuilds the connection whenever the endpoint changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remote {
    /// Deployment identity
    pub id: String,

    /// Host of the remote's Deployment service
    pub host: String,

    /// Port of the remote's Deployment service
    pub port: u16,
}

impl Remote {
    /// Create a new remote descriptor.
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// Whether this remote points at the same endpoint as `other`.
    pub fn same_endpoint(&self, other: &Remote) -> bool {
        self.host == other.host && self.port == other.port
    }
}

/// Empty acknowledgement body for unary RPCs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {}

/// Body of a heartbeat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    /// Identity of the deployment that answered
    pub id: String,
}
