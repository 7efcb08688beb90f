//! State shared by both coordination roles.
//!
//! Every node owns its cache disks, answers cache status queries from its
//! metadata store and exposes a liveness flag that health checks can read
//! without touching the heartbeat loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rangecache_spi::{
    BlockRange, CacheConfig, DiskDirectoryManager, DiskSlot, EligibilityRule, MetadataStore,
    PathShardResolver,
};
use tracing::debug;

use crate::error::Result;

/// Configuration, placement and metadata of one cache node.
pub struct NodeCore {
    config: Arc<CacheConfig>,
    disks: DiskDirectoryManager,
    resolver: PathShardResolver,
    rule: EligibilityRule,
    store: Arc<dyn MetadataStore>,
    up: Arc<AtomicBool>,
}

impl NodeCore {
    /// Validates `config` and compiles its policy.
    ///
    /// Fails on a zero disk count or an invalid eligibility pattern.
    pub fn new(config: Arc<CacheConfig>, store: Arc<dyn MetadataStore>) -> Result<Self> {
        let dirs = config.directory_config()?;
        let rule = EligibilityRule::from_config(&config)?;
        Ok(Self {
            disks: DiskDirectoryManager::new(dirs.clone()),
            resolver: PathShardResolver::new(dirs),
            rule,
            store,
            config,
            up: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn initialize_disks(&self) -> Result<Vec<DiskSlot>> {
        Ok(self.disks.ensure_directories()?)
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    pub(crate) fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    /// Shared handle on the liveness flag, for tasks that may take the node down.
    pub(crate) fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.up)
    }

    /// Local cache file for `remote`, or `None` if the policy skips it.
    pub fn cache_location(&self, remote: &str) -> Option<String> {
        if self.rule.should_skip_cache(remote) {
            return None;
        }
        let local = self.resolver.local_path(remote);
        debug!(remote, local = %local, "resolved cache location");
        Some(local)
    }

    /// Sidecar metadata file for the cache entry of `remote`.
    pub fn metadata_location(&self, remote: &str) -> String {
        self.resolver.metadata_path(remote)
    }

    pub fn is_cached(&self, file: &str, range: BlockRange) -> bool {
        self.store.is_cached(file, range)
    }

    pub fn mark_cached(&self, file: &str, range: BlockRange) {
        self.store.mark_cached(file, range);
    }
}
