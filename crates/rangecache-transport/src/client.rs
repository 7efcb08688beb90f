//! Client side of the coordinator protocol.
//!
//! This module defines the [`CoordinatorClient`] and [`ConnectionFactory`]
//! traits that every transport implementation provides, plus the client
//! settings shared by all of them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rangecache_spi::{BlockRange, CacheConfig};

use crate::error::Result;

/// Settings for coordinator clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bound on a single connection attempt or call (default: 10 seconds).
    pub timeout: Duration,
    /// Attempts before a call gives up (default: 3).
    pub max_retries: u32,
    /// Pause between attempts (default: 100ms).
    pub backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl ClientConfig {
    /// Client settings of a node configuration.
    pub fn from_cache_config(config: &CacheConfig) -> Self {
        Self {
            timeout: config.client_timeout(),
            max_retries: config.client_max_retries,
            backoff: config.client_retry_backoff(),
        }
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// An established connection to a coordination service.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Returns true if the remote service is up.
    async fn ping(&self) -> Result<bool>;

    /// Reports that `worker` is alive. Only a master accepts heartbeats.
    async fn heartbeat(&self, worker: &str) -> Result<()>;

    /// Asks whether `range` of `file` is cached on the remote node.
    async fn is_cached(&self, file: &str, range: BlockRange) -> Result<bool>;

    /// Records `range` of `file` as cached on the remote node.
    async fn mark_cached(&self, file: &str, range: BlockRange) -> Result<()>;
}

/// Opens connections to coordination services.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Connects to the service at `addr`.
    ///
    /// Fails with a transport error if the connection cannot be established.
    async fn create_client(
        &self,
        addr: &str,
        config: &ClientConfig,
    ) -> Result<Arc<dyn CoordinatorClient>>;
}
