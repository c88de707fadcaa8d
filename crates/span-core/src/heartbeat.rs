//! Heartbeat monitor - fixed-cadence liveness rounds
//!
//! Every round probes all registered remotes concurrently with a bounded
//! per-call timeout. The round result is the subset that answered without
//! error; "connect" events are derived edge-triggered by comparing against
//! the previous round. Probing cadence is fixed - no backoff; consumers of
//! connect events carry their own retry semantics.

use std::collections::HashSet;

use futures::future::join_all;
use span_client::PeerClient;
use tracing::debug;

/// Run one heartbeat round over the given connections.
///
/// Probes run concurrently; each is bounded by the connection's per-call
/// heartbeat timeout. Probe failures are logged at debug and never remove
/// the remote from the registry.
pub async fn run_round(clients: Vec<(String, PeerClient)>) -> HashSet<String> {
    let probes = clients.into_iter().map(|(id, client)| async move {
        match client.heartbeat().await {
            Ok(_) => Some(id),
            Err(e) => {
                debug!(remote = %id, error = %e, "heartbeat probe failed");
                None
            }
        }
    });

    join_all(probes).await.into_iter().flatten().collect()
}

/// Derive edge-triggered connect events from two consecutive rounds.
///
/// A remote connects when it is in the current success set but was absent
/// from the previous one; a remote that stays connected across rounds
/// produces no repeated event. The result is sorted for deterministic
/// processing order.
pub fn connect_edges(previous: &HashSet<String>, current: &HashSet<String>) -> Vec<String> {
    let mut edges: Vec<String> = current.difference(previous).cloned().collect();
    edges.sort();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_success_is_an_edge() {
        assert_eq!(connect_edges(&set(&[]), &set(&["a"])), vec!["a"]);
    }

    #[test]
    fn test_steady_connection_produces_no_edge() {
        assert!(connect_edges(&set(&["a"]), &set(&["a"])).is_empty());
    }

    #[test]
    fn test_reconnect_after_gap_fires_again() {
        // a answers, misses a round, answers again: two maximal runs
        let r1 = connect_edges(&set(&[]), &set(&["a"]));
        let r2 = connect_edges(&set(&["a"]), &set(&[]));
        let r3 = connect_edges(&set(&[]), &set(&["a"]));

        assert_eq!(r1, vec!["a"]);
        assert!(r2.is_empty());
        assert_eq!(r3, vec!["a"]);
    }

    #[test]
    fn test_edges_are_sorted() {
        assert_eq!(
            connect_edges(&set(&[]), &set(&["b", "a", "c"])),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_disconnect_is_not_an_edge() {
        assert!(connect_edges(&set(&["a", "b"]), &set(&["a"])).is_empty());
    }
}
