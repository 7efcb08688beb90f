//! Worker role: caches locally and keeps itself registered with the master.

use std::sync::Arc;

use parking_lot::Mutex;
use rangecache_spi::cluster::local_host;
use rangecache_spi::{CacheConfig, MetadataStore};
use rangecache_transport::ConnectionFactory;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{CoordinatorError, Result};
use crate::heartbeat::{HeartbeatService, HeartbeatStatus};
use crate::node::NodeCore;
use crate::role::NodeRole;

struct HeartbeatHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
    status: watch::Receiver<HeartbeatStatus>,
}

/// The worker coordination service.
pub struct WorkerService {
    node: NodeCore,
    factory: Arc<dyn ConnectionFactory>,
    worker_host: String,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
}

impl WorkerService {
    pub fn new(
        config: Arc<CacheConfig>,
        store: Arc<dyn MetadataStore>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let worker_host = config.worker_host.clone().unwrap_or_else(local_host);
        Ok(Self {
            node: NodeCore::new(config, store)?,
            factory,
            worker_host,
            heartbeat: Mutex::new(None),
        })
    }

    pub fn node(&self) -> &NodeCore {
        &self.node
    }

    /// Name this worker reports in its heartbeats.
    pub fn worker_host(&self) -> &str {
        &self.worker_host
    }

    /// Prepares the cache disks and spawns the heartbeat loop.
    ///
    /// Must be called from within a tokio runtime. Starting twice is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut heartbeat = self.heartbeat.lock();
        if heartbeat.is_some() {
            return Ok(());
        }

        let disks = self.node.initialize_disks()?;
        let cancel = CancellationToken::new();
        let (service, status) = HeartbeatService::new(
            self.node.config(),
            Arc::clone(&self.factory),
            self.worker_host.clone(),
            cancel.clone(),
        );
        // Set before spawning so a loop that fails at once leaves the node down.
        self.node.set_up(true);
        *heartbeat = Some(HeartbeatHandle {
            cancel,
            task: Some(service.with_liveness(self.node.liveness()).spawn()),
            status,
        });
        info!(
            worker = %self.worker_host,
            master = %self.node.config().master_addr(),
            disks = disks.len(),
            "worker coordination service up"
        );
        Ok(())
    }

    /// Latest status of the heartbeat loop, if started.
    pub fn heartbeat_status(&self) -> Option<HeartbeatStatus> {
        self.heartbeat
            .lock()
            .as_ref()
            .map(|h| h.status.borrow().clone())
    }

    /// Receiver following the heartbeat loop's status, if started.
    pub fn subscribe(&self) -> Option<watch::Receiver<HeartbeatStatus>> {
        self.heartbeat.lock().as_ref().map(|h| h.status.clone())
    }

    /// Waits for the heartbeat loop to end, returning its error if it failed.
    ///
    /// A failed loop has already taken the service down by then.
    pub async fn wait(&self) -> Result<()> {
        let task = self
            .heartbeat
            .lock()
            .as_mut()
            .and_then(|h| h.task.take())
            .ok_or(CoordinatorError::NotRunning)?;

        let outcome = join(task).await;
        if let Err(e) = &outcome {
            error!(worker = %self.worker_host, error = %e, "heartbeat loop failed, worker is down");
            self.node.set_up(false);
        }
        outcome
    }

    /// Stops the heartbeat loop and marks the service down.
    pub async fn stop(&self) {
        self.node.set_up(false);
        let handle = self.heartbeat.lock().take();
        if let Some(mut handle) = handle {
            handle.cancel.cancel();
            if let Some(task) = handle.task.take() {
                if let Err(e) = join(task).await {
                    warn!(worker = %self.worker_host, error = %e, "heartbeat loop ended with error");
                }
            }
        }
        info!(worker = %self.worker_host, "worker coordination service stopped");
    }

    /// Heartbeats are handled by the master only; always fails.
    pub fn handle_heartbeat(&self, worker: &str) -> Result<()> {
        error!(from = worker, "heartbeat sent to a worker node");
        Err(CoordinatorError::RoleViolation {
            op: "handle_heartbeat",
            role: NodeRole::Worker,
        })
    }
}

async fn join(task: JoinHandle<Result<()>>) -> Result<()> {
    task.await.map_err(|e| CoordinatorError::TaskFailed {
        reason: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatState;
    use async_trait::async_trait;
    use rangecache_spi::InMemoryMetadataStore;
    use rangecache_transport::{ClientConfig, CoordinatorClient, TransportError};
    use tempfile::TempDir;

    struct Unreachable;

    #[async_trait]
    impl ConnectionFactory for Unreachable {
        async fn create_client(
            &self,
            addr: &str,
            _config: &ClientConfig,
        ) -> rangecache_transport::Result<Arc<dyn CoordinatorClient>> {
            Err(TransportError::ConnectionRefused {
                addr: addr.to_string(),
            })
        }
    }

    fn worker(root: &TempDir, on_master: bool) -> WorkerService {
        let config = CacheConfig {
            data_dir_prefix: format!("{}/", root.path().display()),
            max_disks: 1,
            on_master,
            worker_host: Some(String::from("worker-1")),
            ..CacheConfig::default()
        };
        WorkerService::new(
            Arc::new(config),
            Arc::new(InMemoryMetadataStore::new(1024)),
            Arc::new(Unreachable),
        )
        .unwrap()
    }

    #[test]
    fn test_handle_heartbeat_is_role_violation() {
        let root = TempDir::new().unwrap();
        for on_master in [false, true] {
            let err = worker(&root, on_master)
                .handle_heartbeat("other")
                .unwrap_err();
            assert!(matches!(
                err,
                CoordinatorError::RoleViolation {
                    op: "handle_heartbeat",
                    role: NodeRole::Worker
                }
            ));
        }
    }

    #[test]
    fn test_worker_host_from_config() {
        let root = TempDir::new().unwrap();
        assert_eq!(worker(&root, false).worker_host(), "worker-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_stop() {
        let root = TempDir::new().unwrap();
        let worker = worker(&root, false);
        assert!(worker.heartbeat_status().is_none());

        worker.start().unwrap();
        assert!(worker.node().is_up());
        assert!(worker.heartbeat_status().is_some());

        worker.stop().await;
        assert!(!worker.node().is_up());
        assert!(worker.heartbeat_status().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_loop_takes_worker_down() {
        let root = TempDir::new().unwrap();
        let config = CacheConfig {
            data_dir_prefix: format!("{}/", root.path().display()),
            max_disks: 1,
            service_max_retries: 2,
            client_max_retries: 1,
            client_retry_backoff_ms: 0,
            ..CacheConfig::default()
        };
        let worker = WorkerService::new(
            Arc::new(config),
            Arc::new(InMemoryMetadataStore::new(1024)),
            Arc::new(Unreachable),
        )
        .unwrap();
        worker.start().unwrap();
        assert!(worker.node().is_up());

        let mut status = worker.subscribe().unwrap();
        status
            .wait_for(|s| s.state == HeartbeatState::Failed)
            .await
            .unwrap();
        assert!(!worker.node().is_up());
    }

    #[tokio::test]
    async fn test_wait_before_start() {
        let root = TempDir::new().unwrap();
        let err = worker(&root, false).wait().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NotRunning));
    }
}
