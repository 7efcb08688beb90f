//! Worker liveness as observed by the master.
//!
//! The master records the last heartbeat of every worker. A worker is
//! reported active while its last heartbeat is younger than the liveness
//! expiry and inactive afterwards; workers are never forgotten, so a node
//! that went quiet stays visible as inactive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rangecache_spi::{ClusterManager, ClusterNode, ClusterType, NodeState};
use tokio::time::Instant;
use tracing::info;

/// Last heartbeat time of every worker that ever reported in.
#[derive(Default)]
pub struct WorkerRegistry {
    last_seen: RwLock<HashMap<String, Instant>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a heartbeat from `worker` at the current time.
    pub fn record(&self, worker: &str) {
        let now = Instant::now();
        let previous = self.last_seen.write().insert(worker.to_string(), now);
        if previous.is_none() {
            info!(worker, "worker joined");
        }
    }

    pub fn last_seen(&self, worker: &str) -> Option<Instant> {
        self.last_seen.read().get(worker).copied()
    }

    /// Number of workers that ever sent a heartbeat.
    pub fn len(&self) -> usize {
        self.last_seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.read().is_empty()
    }

    /// Every known worker, active if heard from within `expiry`.
    pub fn nodes(&self, expiry: Duration) -> Vec<ClusterNode> {
        let now = Instant::now();
        self.last_seen
            .read()
            .iter()
            .map(|(host, seen)| {
                let state = if now.duration_since(*seen) <= expiry {
                    NodeState::Active
                } else {
                    NodeState::Inactive
                };
                ClusterNode::new(host.clone(), state)
            })
            .collect()
    }
}

/// Cluster membership backed by the master's worker registry.
#[derive(Clone)]
pub struct HeartbeatClusterManager {
    registry: Arc<WorkerRegistry>,
    expiry: Duration,
}

impl HeartbeatClusterManager {
    pub fn new(registry: Arc<WorkerRegistry>, expiry: Duration) -> Self {
        Self { registry, expiry }
    }
}

impl ClusterManager for HeartbeatClusterManager {
    fn nodes(&self) -> Vec<ClusterNode> {
        self.registry.nodes(self.expiry)
    }

    fn cluster_type(&self) -> ClusterType {
        ClusterType::Heartbeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_of(nodes: &[ClusterNode], host: &str) -> Option<NodeState> {
        nodes.iter().find(|n| n.host == host).map(|n| n.state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_and_expire() {
        let registry = Arc::new(WorkerRegistry::new());
        let manager = HeartbeatClusterManager::new(registry.clone(), Duration::from_secs(10));
        assert!(manager.nodes().is_empty());

        registry.record("worker-a");
        registry.record("worker-b");
        assert_eq!(registry.len(), 2);
        assert!(manager.nodes().iter().all(ClusterNode::is_active));

        tokio::time::advance(Duration::from_secs(6)).await;
        registry.record("worker-b");
        tokio::time::advance(Duration::from_secs(6)).await;

        let nodes = manager.nodes();
        assert_eq!(state_of(&nodes, "worker-a"), Some(NodeState::Inactive));
        assert_eq!(state_of(&nodes, "worker-b"), Some(NodeState::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_worker_recovers() {
        let registry = WorkerRegistry::new();
        registry.record("worker-a");
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(
            state_of(&registry.nodes(Duration::from_secs(10)), "worker-a"),
            Some(NodeState::Inactive)
        );

        registry.record("worker-a");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            state_of(&registry.nodes(Duration::from_secs(10)), "worker-a"),
            Some(NodeState::Active)
        );
    }

    #[test]
    fn test_cluster_type() {
        let manager =
            HeartbeatClusterManager::new(Arc::new(WorkerRegistry::new()), Duration::from_secs(1));
        assert_eq!(manager.cluster_type(), ClusterType::Heartbeat);
    }
}
