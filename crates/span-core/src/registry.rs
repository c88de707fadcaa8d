//! Remote registry - known peer deployments and their connections

use std::collections::HashMap;
use std::time::Duration;

use span_client::PeerClient;
use span_types::Remote;
use tracing::{debug, error, info, warn};

/// A registered remote and its exclusive RPC connection.
#[derive(Debug)]
pub struct RemoteEntry {
    /// The remote descriptor as last upserted
    pub remote: Remote,

    /// Connection bound to the remote's current endpoint
    pub client: PeerClient,

    /// Bumped every time the connection is rebuilt
    pub generation: u64,
}

/// The set of known peer deployments.
///
/// Owned exclusively by the runtime fold; connections are created on first
/// upsert, rebuilt when the endpoint changes, and dropped on removal. A
/// failed heartbeat never removes a remote - only an explicit delete does.
#[derive(Debug)]
pub struct RemoteRegistry {
    remotes: HashMap<String, RemoteEntry>,
    heartbeat_timeout: Duration,
}

impl RemoteRegistry {
    /// Create an empty registry; `heartbeat_timeout` bounds each liveness
    /// probe issued through the registry's connections.
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            remotes: HashMap::new(),
            heartbeat_timeout,
        }
    }

    /// Register a remote or update its endpoint.
    ///
    /// The connection is rebuilt only when `host`/`port` actually changed;
    /// re-upserting an identical remote leaves it untouched.
    pub fn upsert(&mut self, remote: Remote, refresh: bool) {
        match self.remotes.get_mut(&remote.id) {
            Some(entry) if entry.remote.same_endpoint(&remote) => {
                if refresh {
                    debug!(remote = %remote.id, "remote refreshed; endpoint unchanged");
                } else {
                    warn!(remote = %remote.id, "duplicate remote upsert; connection unchanged");
                }
                entry.remote = remote;
            }
            Some(entry) => {
                match PeerClient::new(&remote, self.heartbeat_timeout) {
                    Ok(client) => {
                        entry.client = client;
                        entry.generation += 1;
                        info!(
                            remote = %remote.id,
                            endpoint = %entry.client.endpoint(),
                            generation = entry.generation,
                            "remote endpoint changed; connection rebuilt"
                        );
                        entry.remote = remote;
                    }
                    Err(e) => {
                        error!(remote = %remote.id, error = %e, "failed to rebuild connection; keeping previous endpoint");
                    }
                }
            }
            None => match PeerClient::new(&remote, self.heartbeat_timeout) {
                Ok(client) => {
                    info!(remote = %remote.id, endpoint = %client.endpoint(), "remote registered");
                    self.remotes.insert(
                        remote.id.clone(),
                        RemoteEntry {
                            remote,
                            client,
                            generation: 0,
                        },
                    );
                }
                Err(e) => {
                    error!(remote = %remote.id, error = %e, "failed to create connection; remote not registered");
                }
            },
        }
    }

    /// Remove a remote, dropping its connection. Removal of an unknown id
    /// is a warning, not an error.
    pub fn remove(&mut self, id: &str) {
        if self.remotes.remove(id).is_some() {
            info!(remote = %id, "remote removed");
        } else {
            warn!(remote = %id, "removal of unregistered remote");
        }
    }

    /// Whether a remote with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.remotes.contains_key(id)
    }

    /// Look up a registered remote.
    pub fn get(&self, id: &str) -> Option<&RemoteEntry> {
        self.remotes.get(id)
    }

    /// Clone the connection for a remote, if registered.
    pub fn client(&self, id: &str) -> Option<PeerClient> {
        self.remotes.get(id).map(|e| e.client.clone())
    }

    /// Snapshot all connections for a heartbeat round.
    pub fn clients(&self) -> Vec<(String, PeerClient)> {
        self.remotes
            .iter()
            .map(|(id, entry)| (id.clone(), entry.client.clone()))
            .collect()
    }

    /// Number of registered remotes.
    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    /// Whether no remotes are registered.
    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RemoteRegistry {
        RemoteRegistry::new(Duration::from_secs(2))
    }

    #[test]
    fn test_upsert_creates_connection() {
        let mut reg = registry();
        reg.upsert(Remote::new("a", "127.0.0.1", 7423), false);

        let entry = reg.get("a").unwrap();
        assert_eq!(entry.generation, 0);
        assert_eq!(entry.client.endpoint(), "http://127.0.0.1:7423");
    }

    #[test]
    fn test_duplicate_upsert_is_idempotent() {
        let mut reg = registry();
        reg.upsert(Remote::new("a", "127.0.0.1", 7423), false);
        reg.upsert(Remote::new("a", "127.0.0.1", 7423), false);

        // same endpoint: connection untouched
        assert_eq!(reg.get("a").unwrap().generation, 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_endpoint_change_rebuilds_connection() {
        let mut reg = registry();
        reg.upsert(Remote::new("a", "127.0.0.1", 7423), false);
        reg.upsert(Remote::new("a", "127.0.0.1", 7999), false);

        let entry = reg.get("a").unwrap();
        assert_eq!(entry.generation, 1);
        assert_eq!(entry.client.endpoint(), "http://127.0.0.1:7999");
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut reg = registry();
        reg.remove("ghost");
        assert!(reg.is_empty());
    }

    #[test]
    fn test_remove_drops_entry() {
        let mut reg = registry();
        reg.upsert(Remote::new("a", "127.0.0.1", 7423), false);
        reg.remove("a");
        assert!(!reg.contains("a"));
        assert!(reg.client("a").is_none());
    }
}
