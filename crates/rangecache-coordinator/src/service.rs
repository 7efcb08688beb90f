//! Role-dispatching coordination service.

use std::sync::Arc;

use rangecache_spi::{BlockRange, CacheConfig, MetadataStore};
use rangecache_transport::ConnectionFactory;
use tracing::info;

use crate::error::Result;
use crate::master::MasterService;
use crate::node::NodeCore;
use crate::role::NodeRole;
use crate::worker::WorkerService;

/// A coordination service in the role its configuration selects.
pub enum CoordinationService {
    /// Answers heartbeats and tracks worker liveness.
    Master(MasterService),
    /// Heartbeats to its master.
    Worker(WorkerService),
}

impl CoordinationService {
    /// Builds the master or worker service selected by `config.on_master`.
    ///
    /// `factory` is only used by workers to reach their master.
    pub fn from_config(
        config: Arc<CacheConfig>,
        store: Arc<dyn MetadataStore>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let role = NodeRole::from_config(&config);
        info!(%role, master = %config.master_addr(), "creating coordination service");
        match role {
            NodeRole::Master => Ok(Self::Master(MasterService::new(config, store)?)),
            NodeRole::Worker => Ok(Self::Worker(WorkerService::new(config, store, factory)?)),
        }
    }

    pub fn role(&self) -> NodeRole {
        match self {
            Self::Master(_) => NodeRole::Master,
            Self::Worker(_) => NodeRole::Worker,
        }
    }

    pub fn node(&self) -> &NodeCore {
        match self {
            Self::Master(m) => m.node(),
            Self::Worker(w) => w.node(),
        }
    }

    pub fn as_master(&self) -> Option<&MasterService> {
        match self {
            Self::Master(m) => Some(m),
            Self::Worker(_) => None,
        }
    }

    pub fn as_worker(&self) -> Option<&WorkerService> {
        match self {
            Self::Master(_) => None,
            Self::Worker(w) => Some(w),
        }
    }

    pub fn start(&self) -> Result<()> {
        match self {
            Self::Master(m) => m.start(),
            Self::Worker(w) => w.start(),
        }
    }

    pub async fn stop(&self) {
        match self {
            Self::Master(m) => m.stop(),
            Self::Worker(w) => w.stop().await,
        }
    }

    /// Waits until a worker's heartbeat loop ends. Returns at once on a master.
    pub async fn wait(&self) -> Result<()> {
        match self {
            Self::Master(_) => Ok(()),
            Self::Worker(w) => w.wait().await,
        }
    }

    pub fn is_up(&self) -> bool {
        self.node().is_up()
    }

    pub fn handle_heartbeat(&self, worker: &str) -> Result<()> {
        match self {
            Self::Master(m) => m.handle_heartbeat(worker),
            Self::Worker(w) => w.handle_heartbeat(worker),
        }
    }

    pub fn cache_location(&self, remote: &str) -> Option<String> {
        self.node().cache_location(remote)
    }

    pub fn metadata_location(&self, remote: &str) -> String {
        self.node().metadata_location(remote)
    }

    pub fn is_cached(&self, file: &str, range: BlockRange) -> bool {
        self.node().is_cached(file, range)
    }

    pub fn mark_cached(&self, file: &str, range: BlockRange) {
        self.node().mark_cached(file, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoordinatorError;
    use crate::local::LocalNetwork;
    use rangecache_spi::InMemoryMetadataStore;
    use tempfile::TempDir;

    fn service(root: &TempDir, on_master: bool) -> CoordinationService {
        let config = CacheConfig {
            data_dir_prefix: format!("{}/", root.path().display()),
            max_disks: 1,
            on_master,
            worker_host: Some(String::from("worker-1")),
            ..CacheConfig::default()
        };
        CoordinationService::from_config(
            Arc::new(config),
            Arc::new(InMemoryMetadataStore::new(1024)),
            LocalNetwork::new().connection_factory(),
        )
        .unwrap()
    }

    #[test]
    fn test_role_follows_on_master() {
        let root = TempDir::new().unwrap();

        let master = service(&root, true);
        assert_eq!(master.role(), NodeRole::Master);
        assert!(master.as_master().is_some());
        assert!(master.as_worker().is_none());

        let worker = service(&root, false);
        assert_eq!(worker.role(), NodeRole::Worker);
        assert!(worker.as_worker().is_some());
        assert!(worker.as_master().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let root = TempDir::new().unwrap();
        let config = CacheConfig {
            data_dir_prefix: format!("{}/", root.path().display()),
            location_whitelist: Some(String::from("(unclosed")),
            ..CacheConfig::default()
        };
        let result = CoordinationService::from_config(
            Arc::new(config),
            Arc::new(InMemoryMetadataStore::new(1024)),
            LocalNetwork::new().connection_factory(),
        );
        assert!(matches!(result, Err(CoordinatorError::Cache(_))));
    }

    #[test]
    fn test_handle_heartbeat_dispatch() {
        let root = TempDir::new().unwrap();

        let master = service(&root, true);
        master.start().unwrap();
        master.handle_heartbeat("worker-a").unwrap();
        assert_eq!(master.as_master().unwrap().registry().len(), 1);

        let worker = service(&root, false);
        assert!(matches!(
            worker.handle_heartbeat("worker-a"),
            Err(CoordinatorError::RoleViolation {
                role: NodeRole::Worker,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_master_start_stop() {
        let root = TempDir::new().unwrap();
        let master = service(&root, true);
        assert!(!master.is_up());
        master.start().unwrap();
        assert!(master.is_up());
        master.wait().await.unwrap();

        master.stop().await;
        assert!(!master.is_up());
    }
}
