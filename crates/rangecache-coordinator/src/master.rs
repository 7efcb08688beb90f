//! Master role: answers worker heartbeats and tracks worker liveness.

use std::sync::Arc;

use rangecache_spi::{CacheConfig, MetadataStore};
use tracing::{debug, info};

use crate::error::{CoordinatorError, Result};
use crate::node::NodeCore;
use crate::registry::{HeartbeatClusterManager, WorkerRegistry};

/// The master coordination service.
pub struct MasterService {
    node: NodeCore,
    registry: Arc<WorkerRegistry>,
}

impl MasterService {
    pub fn new(config: Arc<CacheConfig>, store: Arc<dyn MetadataStore>) -> Result<Self> {
        Ok(Self {
            node: NodeCore::new(config, store)?,
            registry: Arc::new(WorkerRegistry::new()),
        })
    }

    pub fn node(&self) -> &NodeCore {
        &self.node
    }

    /// Prepares the cache disks and starts accepting heartbeats.
    pub fn start(&self) -> Result<()> {
        let disks = self.node.initialize_disks()?;
        self.node.set_up(true);
        info!(disks = disks.len(), "master coordination service up");
        Ok(())
    }

    pub fn stop(&self) {
        self.node.set_up(false);
        info!("master coordination service stopped");
    }

    /// Records a heartbeat from `worker`.
    pub fn handle_heartbeat(&self, worker: &str) -> Result<()> {
        if !self.node.is_up() {
            return Err(CoordinatorError::NotRunning);
        }
        self.registry.record(worker);
        debug!(worker, "heartbeat received");
        Ok(())
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Membership view derived from the heartbeats this master has seen.
    pub fn cluster_manager(&self) -> HeartbeatClusterManager {
        HeartbeatClusterManager::new(
            Arc::clone(&self.registry),
            self.node.config().worker_liveness_expiry(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangecache_spi::{ClusterManager, InMemoryMetadataStore, NodeState};
    use tempfile::TempDir;

    fn master(root: &TempDir) -> MasterService {
        let config = CacheConfig {
            data_dir_prefix: format!("{}/", root.path().display()),
            max_disks: 2,
            on_master: true,
            ..CacheConfig::default()
        };
        MasterService::new(Arc::new(config), Arc::new(InMemoryMetadataStore::new(1024))).unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_registers_worker() {
        let root = TempDir::new().unwrap();
        let master = master(&root);
        master.start().unwrap();

        master.handle_heartbeat("worker-a").unwrap();
        master.handle_heartbeat("worker-a").unwrap();
        master.handle_heartbeat("worker-b").unwrap();

        let nodes = master.cluster_manager().nodes();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.state == NodeState::Active));
    }

    #[test]
    fn test_heartbeat_rejected_when_stopped() {
        let root = TempDir::new().unwrap();
        let master = master(&root);
        let err = master.handle_heartbeat("worker-a").unwrap_err();
        assert!(matches!(err, CoordinatorError::NotRunning));
        assert!(master.registry().is_empty());
    }

    #[test]
    fn test_start_creates_disks() {
        let root = TempDir::new().unwrap();
        let master = master(&root);
        master.start().unwrap();
        assert!(master.node().is_up());
        assert!(root.path().join("0/fcache").is_dir());
        assert!(root.path().join("1/fcache").is_dir());

        master.stop();
        assert!(!master.node().is_up());
    }
}
