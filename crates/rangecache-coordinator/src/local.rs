//! In-process transport between coordination services.
//!
//! Services bind themselves to an address on a [`LocalNetwork`]; clients
//! created by its connection factory call straight into the bound service.
//! A missing or stopped service refuses connections, and a service that
//! goes down under an open client resets it.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use rangecache_spi::BlockRange;
use rangecache_transport::{
    ClientConfig, ConnectionFactory, CoordinatorClient, Result as TransportResult, TransportError,
};
use tracing::debug;

use crate::error::CoordinatorError;
use crate::service::CoordinationService;

/// Address book of in-process coordination services.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    services: Arc<DashMap<String, Weak<CoordinationService>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `service` to `addr`, replacing any previous binding.
    pub fn bind(&self, addr: impl Into<String>, service: &Arc<CoordinationService>) {
        let addr = addr.into();
        debug!(addr = %addr, role = %service.role(), "service bound");
        self.services.insert(addr, Arc::downgrade(service));
    }

    pub fn unbind(&self, addr: &str) {
        self.services.remove(addr);
    }

    pub fn lookup(&self, addr: &str) -> Option<Arc<CoordinationService>> {
        self.services.get(addr).and_then(|s| s.upgrade())
    }

    /// Connection factory dialing services on this network.
    pub fn connection_factory(&self) -> Arc<dyn ConnectionFactory> {
        Arc::new(LocalConnectionFactory {
            network: self.clone(),
        })
    }
}

/// Connects to services bound on a [`LocalNetwork`].
pub struct LocalConnectionFactory {
    network: LocalNetwork,
}

#[async_trait]
impl ConnectionFactory for LocalConnectionFactory {
    async fn create_client(
        &self,
        addr: &str,
        _config: &ClientConfig,
    ) -> TransportResult<Arc<dyn CoordinatorClient>> {
        match self.network.lookup(addr) {
            Some(service) if service.is_up() => Ok(Arc::new(LocalClient {
                service: Arc::downgrade(&service),
            })),
            _ => Err(TransportError::ConnectionRefused {
                addr: addr.to_string(),
            }),
        }
    }
}

struct LocalClient {
    service: Weak<CoordinationService>,
}

impl LocalClient {
    fn service(&self) -> TransportResult<Arc<CoordinationService>> {
        self.service
            .upgrade()
            .filter(|s| s.is_up())
            .ok_or(TransportError::ConnectionReset)
    }
}

fn remote(error: CoordinatorError) -> TransportError {
    TransportError::Remote {
        reason: error.to_string(),
    }
}

#[async_trait]
impl CoordinatorClient for LocalClient {
    async fn ping(&self) -> TransportResult<bool> {
        Ok(self.service().is_ok())
    }

    async fn heartbeat(&self, worker: &str) -> TransportResult<()> {
        self.service()?.handle_heartbeat(worker).map_err(remote)
    }

    async fn is_cached(&self, file: &str, range: BlockRange) -> TransportResult<bool> {
        Ok(self.service()?.is_cached(file, range))
    }

    async fn mark_cached(&self, file: &str, range: BlockRange) -> TransportResult<()> {
        self.service()?.mark_cached(file, range);
        Ok(())
    }
}
